mod util;

#[cfg(feature = "serde")]
mod with_serde {
    use super::util::*;
    use plexgen::network::NetworkSnapshot;
    use plexgen::prelude::*;

    #[test_log::test]
    fn catalog_survives_json() {
        let catalog = kinase_catalog();
        let json = serde_json::to_string_pretty(&catalog).unwrap();
        eprintln!("Serialized catalog: {json}");
        let back: Catalog = serde_json::from_str(&json).unwrap();

        assert_eq!(back.len(), catalog.len());
        let s = back.id_of("S").unwrap();
        assert_eq!(back.mol_type(s), catalog.mol_type(catalog.id_of("S").unwrap()));
        assert_eq!(back.modification("phos").unwrap().weight_delta, 80.0);
    }

    #[test_log::test]
    fn invalid_catalog_is_rejected_on_load() {
        let json = r#"{
            "mol_types": [
                { "name": "S", "binding_sites": [], "weight": 1.0,
                  "mod_sites": [ { "name": "p", "default_modification": "phos" } ] }
            ],
            "modifications": []
        }"#;
        assert!(serde_json::from_str::<Catalog>(json).is_err());
    }

    #[test_log::test]
    fn config_defaults_fill_missing_fields() {
        let config: NetworkConfig = serde_json::from_str(r#"{ "default_depth": 4 }"#).unwrap();
        assert_eq!(config, NetworkConfig::default().with_default_depth(4));
    }

    #[test_log::test]
    fn snapshot_lists_species_and_reactions() {
        let catalog = ab_catalog();
        let mut network = Network::new(catalog.clone());
        network
            .add_dimerization(("A", "a1"), ("B", "b1"), ConstantRate(1.5))
            .unwrap();
        let a = network.add_species(&single(&catalog, "A"), None).unwrap();
        network.add_species(&single(&catalog, "B"), None).unwrap();
        network.update_population(a, 7, 1).unwrap();

        let snapshot = network.snapshot().unwrap();
        assert_eq!(snapshot.species.len(), 3);
        assert_eq!(snapshot.reactions.len(), 1);
        assert_eq!(snapshot.families, 3);
        assert_eq!(snapshot.species[0].name, "A");
        assert_eq!(snapshot.species[0].population, 7);
        assert_eq!(snapshot.species[2].weight, 150.0);

        let json = serde_json::to_string(&snapshot).unwrap();
        let back: NetworkSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
