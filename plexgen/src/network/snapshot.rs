use super::{Network, NetworkResult, Reaction};
use crate::family::{FamilyId, SpeciesId};
use crate::mol::{Massive, MolParam};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpeciesSnapshot {
    pub id: SpeciesId,
    pub family: FamilyId,
    pub name: String,
    pub population: u64,
    pub weight: f64,
    pub mol_params: Vec<MolParam>,
}

/// Everything discovered so far, in creation order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NetworkSnapshot {
    pub species: Vec<SpeciesSnapshot>,
    pub reactions: Vec<Reaction>,
    pub families: usize,
}

impl Network {
    pub fn snapshot(&self) -> NetworkResult<NetworkSnapshot> {
        let species = self
            .recognizer
            .all_species()
            .iter()
            .map(|s| {
                Ok(SpeciesSnapshot {
                    id: s.id(),
                    family: s.family(),
                    name: self.canonical_name(s.id())?.to_string(),
                    population: s.population(),
                    weight: s.weight(),
                    mol_params: s.mol_params().to_vec(),
                })
            })
            .collect::<NetworkResult<Vec<_>>>()?;
        Ok(NetworkSnapshot {
            species,
            reactions: self.reactions.clone(),
            families: self.recognizer.family_count(),
        })
    }
}
