//! The Zentral entities exposed as resources and data sources.
//!
//! Each submodule declares one entity: its typed model, its schema and its
//! codec. Registration happens in [`resources`] and [`data_sources`].
//!
//! Model fields carry the schema attribute names; their documentation lives
//! in the schema descriptions exported to the host.

#![allow(missing_docs)]

mod acme_issuer;
mod action;
mod artifact;
mod blueprint;
mod enrollment_custom_view;
mod filevault_config;
mod issuer_backend;
mod meta_business_unit;
mod osquery_pack;
mod probe;
mod scep_issuer;
mod store;
mod tag;
mod taxonomy;

pub use acme_issuer::{AcmeIssuer, AcmeIssuerModel};
pub use action::{Action, ActionModel};
pub use artifact::{Artifact, ArtifactModel};
pub use blueprint::{Blueprint, BlueprintModel};
pub use enrollment_custom_view::{EnrollmentCustomView, EnrollmentCustomViewModel};
pub use filevault_config::{FileVaultConfig, FileVaultConfigModel};
pub use issuer_backend::IssuerBackend;
pub use meta_business_unit::{MetaBusinessUnit, MetaBusinessUnitModel};
pub use osquery_pack::{OsqueryPack, OsqueryPackModel};
pub use probe::{Probe, ProbeModel};
pub use scep_issuer::{ScepIssuer, ScepIssuerModel};
pub use store::{Store, StoreModel};
pub use tag::{Tag, TagModel};
pub use taxonomy::{Taxonomy, TaxonomyModel};

use crate::data_source::{DataSourceHandler, Lookup};
use crate::resource::{Lifecycle, ResourceHandler};
use crate::schema::{Attribute, Block, NestedBlock};
use crate::value::Tri;
use serde::{Deserialize, Serialize};

/// Every resource handler, one per entity type.
pub fn resources() -> Vec<Box<dyn ResourceHandler>> {
    vec![
        Lifecycle::<Blueprint>::boxed(),
        Lifecycle::<FileVaultConfig>::boxed(),
        Lifecycle::<Artifact>::boxed(),
        Lifecycle::<AcmeIssuer>::boxed(),
        Lifecycle::<ScepIssuer>::boxed(),
        Lifecycle::<EnrollmentCustomView>::boxed(),
        Lifecycle::<Store>::boxed(),
        Lifecycle::<Probe>::boxed(),
        Lifecycle::<Action>::boxed(),
        Lifecycle::<Tag>::boxed(),
        Lifecycle::<Taxonomy>::boxed(),
        Lifecycle::<MetaBusinessUnit>::boxed(),
        Lifecycle::<OsqueryPack>::boxed(),
    ]
}

/// The entities that can also be looked up as data sources.
pub fn data_sources() -> Vec<Box<dyn DataSourceHandler>> {
    vec![
        Lookup::<Blueprint>::boxed(),
        Lookup::<FileVaultConfig>::boxed(),
        Lookup::<Artifact>::boxed(),
        Lookup::<Tag>::boxed(),
        Lookup::<Taxonomy>::boxed(),
        Lookup::<MetaBusinessUnit>::boxed(),
        Lookup::<OsqueryPack>::boxed(),
        Lookup::<Store>::boxed(),
    ]
}

/// An extra HTTP header sent by an outbound backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Header {
    /// Header name.
    pub name: Tri<String>,
    /// Header value.
    pub value: Tri<String>,
}

fn headers_block() -> NestedBlock {
    NestedBlock::set(
        Block::new()
            .with_attribute("name", Attribute::required_string())
            .with_attribute("value", Attribute::required_string().sensitive()),
    )
    .with_computed_default()
}
