use crate::codec::{NullPolicy, RequestBody, ResponseBody};
use crate::error::ProviderError;
use crate::resource::{IdKind, Resource};
use crate::schema::{Attribute, Schema};
use crate::value::Tri;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tag taxonomy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxonomyModel {
    pub id: Tri<i64>,
    pub name: Tri<String>,
    pub meta_business_unit_id: Tri<i64>,
}

/// `zentral_taxonomy`
pub struct Taxonomy;

impl Resource for Taxonomy {
    type Model = TaxonomyModel;
    const TYPE_NAME: &'static str = "zentral_taxonomy";
    const ENDPOINT: &'static str = "inventory/taxonomies/";
    const ID_KIND: IdKind = IdKind::Numeric;

    fn schema() -> Schema {
        Schema::v0()
            .with_description("Manages tag taxonomies.")
            .with_attribute("id", Attribute::numeric_id())
            .with_attribute(
                "name",
                Attribute::required_string().with_description("Name of the taxonomy."),
            )
            .with_attribute(
                "meta_business_unit_id",
                Attribute::optional_int64()
                    .with_description("ID of the meta business unit the taxonomy is restricted to."),
            )
    }

    fn to_request(model: &TaxonomyModel) -> Result<Value, ProviderError> {
        RequestBody::new()
            .with("name", &model.name, NullPolicy::Omit)
            .with(
                "meta_business_unit",
                &model.meta_business_unit_id,
                NullPolicy::SendNull,
            )
            .build()
    }

    fn from_response(
        body: &Value,
        _input: Option<&TaxonomyModel>,
    ) -> Result<TaxonomyModel, ProviderError> {
        let r = ResponseBody::new(Self::TYPE_NAME, body)?;
        Ok(TaxonomyModel {
            id: r.required("id")?,
            name: r.required("name")?,
            meta_business_unit_id: r.optional("meta_business_unit")?,
        })
    }
}
