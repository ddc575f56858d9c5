use crate::codec::{NullPolicy, RequestBody, ResponseBody};
use crate::error::ProviderError;
use crate::resource::{IdKind, Resource};
use crate::schema::{Attribute, Schema, Validator};
use crate::value::Tri;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// An inventory tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagModel {
    pub id: Tri<i64>,
    pub name: Tri<String>,
    pub color: Tri<String>,
    pub taxonomy_id: Tri<i64>,
    pub meta_business_unit_id: Tri<i64>,
}

/// `zentral_tag`
pub struct Tag;

impl Resource for Tag {
    type Model = TagModel;
    const TYPE_NAME: &'static str = "zentral_tag";
    const ENDPOINT: &'static str = "inventory/tags/";
    const ID_KIND: IdKind = IdKind::Numeric;

    fn schema() -> Schema {
        Schema::v0()
            .with_description("Manages inventory tags.")
            .with_attribute("id", Attribute::numeric_id())
            .with_attribute(
                "name",
                Attribute::required_string().with_description("Name of the tag."),
            )
            .with_attribute(
                "color",
                Attribute::optional_string()
                    .with_description("Color of the tag, as 6 hexadecimal digits.")
                    .with_default(json!("0079bf"))
                    .with_validator(Validator::regex(
                        "^[0-9a-fA-F]{6}$",
                        "must be a color in RRGGBB hexadecimal format",
                    )),
            )
            .with_attribute(
                "taxonomy_id",
                Attribute::optional_int64().with_description("ID of the tag taxonomy."),
            )
            .with_attribute(
                "meta_business_unit_id",
                Attribute::optional_int64()
                    .with_description("ID of the meta business unit the tag is restricted to."),
            )
    }

    fn to_request(model: &TagModel) -> Result<Value, ProviderError> {
        RequestBody::new()
            .with("name", &model.name, NullPolicy::Omit)
            .with("color", &model.color, NullPolicy::Omit)
            .with("taxonomy", &model.taxonomy_id, NullPolicy::SendNull)
            .with(
                "meta_business_unit",
                &model.meta_business_unit_id,
                NullPolicy::SendNull,
            )
            .build()
    }

    fn from_response(body: &Value, _input: Option<&TagModel>) -> Result<TagModel, ProviderError> {
        let r = ResponseBody::new(Self::TYPE_NAME, body)?;
        Ok(TagModel {
            id: r.required("id")?,
            name: r.required("name")?,
            color: r.required("color")?,
            taxonomy_id: r.optional("taxonomy")?,
            meta_business_unit_id: r.optional("meta_business_unit")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nulls_are_sent() {
        let model = TagModel {
            name: "laptops".into(),
            color: "ff0000".into(),
            ..Default::default()
        };
        assert_eq!(
            Tag::to_request(&model).unwrap(),
            json!({"name": "laptops", "color": "ff0000", "taxonomy": null, "meta_business_unit": null})
        );
    }

    #[test]
    fn test_decode() {
        let body = json!({
            "id": 3,
            "name": "laptops",
            "slug": "laptops",
            "color": "0079bf",
            "taxonomy": 2,
            "meta_business_unit": null,
        });
        let model = Tag::from_response(&body, None).unwrap();
        assert_eq!(model.taxonomy_id, Tri::value(2));
        assert!(model.meta_business_unit_id.is_null());
    }
}
