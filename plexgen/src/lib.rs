//! Rule-based generation of reaction networks over molecular complexes.
//!
//! Complexes ([`Plex`]) are graphs of molecule instances joined at binding sites. They are
//! grouped into structural families by canonical labeling, and each family interns its
//! species by per-mol state. Reaction rules subscribe to structural features; a species is
//! offered to the rules the first time it is expanded, and the products of every new
//! reaction are expanded one level shallower.

pub mod family;
pub mod feature;
pub mod generator;
pub mod mol;
pub mod network;
pub mod plex;
pub mod util;

pub use family::{FamilyId, PlexFamily, Species, SpeciesId};
pub use mol::{Catalog, MolParam, MolTypeId, MoleculeType};
pub use network::{Network, NetworkConfig, NetworkError, NetworkResult, Reaction, ReactionId};
pub use plex::{Binding, Plex, PlexBuilder, PlexIso, PlexMap, SiteSpec};

pub mod prelude {
    pub use crate::family::{ExpansionState, FamilyId, PlexFamily, Species, SpeciesId};
    pub use crate::feature::{FeatureKey, OmniId, StructureQuery};
    pub use crate::generator::{ConstantRate, RateModel, ReactionGenerator};
    pub use crate::mol::{Catalog, Massive, MolParam, MolState, MolTypeId, MoleculeType};
    pub use crate::network::{
        Network, NetworkConfig, NetworkError, NetworkResult, OmniRule, Reaction, ReactionId,
    };
    pub use crate::plex::{Binding, Plex, PlexBuilder, PlexError, SiteSpec};
}
