//! Behaviour shared by every `ConfigStore` backend

use agentcfg_model::{
    AgentConfig, Blueprint, BlueprintId, BlueprintType, ConfigId, ConfigValue, EnvBinding, EnvId,
    EnvironmentBinding, ProjectId, ValueId, ValueType,
};
use agentcfg_store::{ConfigStore, MemoryStore, SqliteStore, StoreError, TxMode};
use chrono::Utc;
use pretty_assertions::assert_eq;
use ulid::{Generator, Ulid};

const WS: &str = "ws-contract";

struct Fixture {
    project: ProjectId,
    config: AgentConfig,
    ids: Generator,
}

impl Fixture {
    fn new() -> Self {
        let project = ProjectId::new();
        let now = Utc::now();
        Self {
            project,
            config: AgentConfig {
                id: ConfigId::from_ulid(Ulid::new()),
                project_id: project,
                created_by: "alice".into(),
                created_at: now,
                last_updated_by: "alice".into(),
                last_updated_at: now,
            },
            ids: Generator::new(),
        }
    }

    fn next(&mut self) -> Ulid {
        self.ids.generate().unwrap()
    }

    fn blueprint(&mut self, blueprint_type: BlueprintType) -> Blueprint {
        let now = Utc::now();
        Blueprint {
            id: BlueprintId::from_ulid(self.next()),
            project_id: self.project,
            blueprint_type,
            description: None,
            envs: vec![],
            created_by: "alice".into(),
            created_at: now,
            last_updated_by: "alice".into(),
            last_updated_at: now,
            values: vec![],
        }
    }

    fn value(&mut self, key: &str, value: &str, from: BlueprintId) -> ConfigValue {
        ConfigValue {
            id: ValueId::from_ulid(self.next()),
            project_id: self.project,
            key: key.into(),
            value: value.into(),
            value_type: ValueType::String,
            description: None,
            valid_from: from,
            valid_to: None,
        }
    }

    fn env(&mut self, name: &str, blueprint_id: BlueprintId) -> EnvironmentBinding {
        let now = Utc::now();
        EnvironmentBinding {
            id: EnvId::from_ulid(self.next()),
            project_id: self.project,
            config_id: self.config.id,
            env_name: name.into(),
            blueprint_id,
            created_by: "alice".into(),
            created_at: now,
            last_updated_by: "alice".into(),
            last_updated_at: now,
        }
    }
}

fn sorted_keys(values: &[ConfigValue]) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = values
        .iter()
        .map(|v| (v.key.clone(), v.value.clone()))
        .collect();
    pairs.sort();
    pairs
}

fn close_then_insert_tracks_intervals(store: &impl ConfigStore) {
    let mut fx = Fixture::new();
    let b1 = fx.blueprint(BlueprintType::Blueprint);
    let b2 = fx.blueprint(BlueprintType::Blueprint);
    let x1 = fx.value("x", "1", b1.id);
    let y2 = fx.value("y", "2", b1.id);
    let x3 = fx.value("x", "3", b2.id);
    let config = fx.config.clone();

    store
        .in_transaction(TxMode::Write, |tx| {
            tx.insert_config(WS, &config)?;
            tx.insert_blueprint(WS, config.id, &b1)?;
            tx.batch_insert_values(WS, config.id, &[x1.clone(), y2.clone()])?;
            Ok::<_, StoreError>(())
        })
        .unwrap();

    let closed = store
        .in_transaction(TxMode::Write, |tx| {
            let closed = tx.close_values_for_keys(WS, fx.project, b2.id, &["x".to_string()])?;
            tx.insert_blueprint(WS, config.id, &b2)?;
            tx.batch_insert_values(WS, config.id, std::slice::from_ref(&x3))?;
            Ok::<_, StoreError>(closed)
        })
        .unwrap();
    assert_eq!(closed, 1);

    let (at_b1, at_b2, delta_b2) = store
        .in_transaction(TxMode::Read, |tx| {
            Ok::<_, StoreError>((
                tx.get_effective_values(WS, fx.project, b1.id)?,
                tx.get_effective_values(WS, fx.project, b2.id)?,
                tx.get_delta_values(WS, b2.id)?,
            ))
        })
        .unwrap();

    assert_eq!(
        sorted_keys(&at_b1),
        vec![("x".into(), "1".into()), ("y".into(), "2".into())]
    );
    assert_eq!(
        sorted_keys(&at_b2),
        vec![("x".into(), "3".into()), ("y".into(), "2".into())]
    );
    assert_eq!(delta_b2, vec![x3]);
}

fn latest_history_and_kinds(store: &impl ConfigStore) {
    let mut fx = Fixture::new();
    let b1 = fx.blueprint(BlueprintType::Blueprint);
    let mask = fx.blueprint(BlueprintType::Mask);
    let b2 = fx.blueprint(BlueprintType::Blueprint);
    let config = fx.config.clone();
    let prod = fx.env("prod", b1.id);
    let dev = fx.env("dev", b1.id);

    store
        .in_transaction(TxMode::Write, |tx| {
            tx.insert_config(WS, &config)?;
            for b in [&b1, &mask, &b2] {
                tx.insert_blueprint(WS, config.id, b)?;
            }
            tx.batch_insert_envs(WS, &[prod.clone(), dev.clone()])
        })
        .unwrap();

    store
        .in_transaction(TxMode::Read, |tx| {
            let latest = tx.get_latest_blueprint(WS, fx.project, BlueprintType::Blueprint)?;
            assert_eq!(latest.map(|b| b.id), Some(b2.id));

            let latest_mask = tx.get_latest_blueprint(WS, fx.project, BlueprintType::Mask)?;
            assert_eq!(latest_mask.map(|b| b.id), Some(mask.id));

            assert_eq!(tx.count_blueprints(WS, fx.project)?, 2);

            let history = tx.get_blueprint_history(WS, fx.project, 10, 0)?;
            let ids: Vec<BlueprintId> = history.iter().map(|b| b.id).collect();
            assert_eq!(ids, vec![b2.id, b1.id]);
            assert_eq!(history[1].envs, vec!["dev".to_string(), "prod".to_string()]);
            assert!(history[0].envs.is_empty());

            let second_page = tx.get_blueprint_history(WS, fx.project, 1, 1)?;
            assert_eq!(second_page.len(), 1);
            assert_eq!(second_page[0].id, b1.id);

            let unknown = BlueprintId::from_ulid(Ulid::new());
            let mut kinds = tx.get_blueprint_kinds(WS, fx.project, &[mask.id, b1.id, unknown])?;
            kinds.sort();
            let mut expected = vec![
                (b1.id, BlueprintType::Blueprint),
                (mask.id, BlueprintType::Mask),
            ];
            expected.sort();
            assert_eq!(kinds, expected);

            let other_project = tx.get_blueprint_kinds(WS, ProjectId::new(), &[b1.id])?;
            assert!(other_project.is_empty());

            let typed = tx.get_blueprint_by_id_and_type(
                WS,
                mask.id,
                fx.project,
                BlueprintType::Blueprint,
            )?;
            assert!(typed.is_none());
            Ok::<_, StoreError>(())
        })
        .unwrap();
}

fn env_update_in_place(store: &impl ConfigStore) {
    let mut fx = Fixture::new();
    let b1 = fx.blueprint(BlueprintType::Blueprint);
    let b2 = fx.blueprint(BlueprintType::Blueprint);
    let config = fx.config.clone();
    let prod = fx.env("prod", b1.id);

    store
        .in_transaction(TxMode::Write, |tx| {
            tx.insert_config(WS, &config)?;
            tx.insert_blueprint(WS, config.id, &b1)?;
            tx.insert_blueprint(WS, config.id, &b2)?;
            tx.batch_insert_envs(WS, std::slice::from_ref(&prod))
        })
        .unwrap();

    let updated = store
        .in_transaction(TxMode::Write, |tx| {
            tx.batch_update_envs(
                WS,
                fx.project,
                "bob",
                Utc::now(),
                &[EnvBinding::new("prod", b2.id), EnvBinding::new("qa", b2.id)],
            )
        })
        .unwrap();
    assert_eq!(updated, 1);

    store
        .in_transaction(TxMode::Read, |tx| {
            assert_eq!(tx.get_blueprint_id_by_env(WS, fx.project, "prod")?, Some(b2.id));
            assert_eq!(tx.get_blueprint_id_by_env(WS, fx.project, "qa")?, None);

            let envs = tx.get_envs_by_names(WS, fx.project, &["prod".into(), "qa".into()])?;
            assert_eq!(envs.len(), 1);
            assert_eq!(envs[0].id, prod.id);
            assert_eq!(envs[0].last_updated_by, "bob");
            assert_eq!(envs[0].created_by, "alice");
            Ok::<_, StoreError>(())
        })
        .unwrap();

    let duplicate = fx.env("prod", b1.id);
    let err = store
        .in_transaction(TxMode::Write, |tx| tx.batch_insert_envs(WS, &[duplicate]))
        .unwrap_err();
    assert!(err.is_conflict());
}

fn zero_width_rows_never_resolve(store: &impl ConfigStore) {
    let mut fx = Fixture::new();
    let b1 = fx.blueprint(BlueprintType::Blueprint);
    let mask = fx.blueprint(BlueprintType::Mask);
    let b2 = fx.blueprint(BlueprintType::Blueprint);
    let config = fx.config.clone();
    let base = fx.value("x", "1", b1.id);
    let mut masked = fx.value("x", "99", mask.id);
    masked.valid_to = Some(mask.id);

    store
        .in_transaction(TxMode::Write, |tx| {
            tx.insert_config(WS, &config)?;
            tx.insert_blueprint(WS, config.id, &b1)?;
            tx.batch_insert_values(WS, config.id, std::slice::from_ref(&base))?;
            tx.insert_blueprint(WS, config.id, &mask)?;
            tx.batch_insert_values(WS, config.id, std::slice::from_ref(&masked))?;
            tx.insert_blueprint(WS, config.id, &b2)
        })
        .unwrap();

    store
        .in_transaction(TxMode::Read, |tx| {
            for at in [b1.id, mask.id, b2.id] {
                let effective = tx.get_effective_values(WS, fx.project, at)?;
                assert_eq!(effective, vec![base.clone()]);
            }
            assert_eq!(tx.get_delta_values(WS, mask.id)?, vec![masked.clone()]);
            Ok::<_, StoreError>(())
        })
        .unwrap();
}

fn config_lookup_by_id(store: &impl ConfigStore) {
    let fx = Fixture::new();
    let config = fx.config.clone();

    store
        .in_transaction(TxMode::Write, |tx| tx.insert_config(WS, &config))
        .unwrap();

    store
        .in_transaction(TxMode::Read, |tx| {
            assert_eq!(tx.get_config_by_id(WS, config.id)?, Some(config.clone()));
            assert_eq!(tx.get_config_by_id("ws-other", config.id)?, None);
            assert_eq!(
                tx.get_config_by_id(WS, ConfigId::from_ulid(Ulid::new()))?,
                None
            );
            Ok::<_, StoreError>(())
        })
        .unwrap();
}

fn failed_write_restores_closed_rows_and_pins(store: &impl ConfigStore) {
    let mut fx = Fixture::new();
    let b1 = fx.blueprint(BlueprintType::Blueprint);
    let b2 = fx.blueprint(BlueprintType::Blueprint);
    let config = fx.config.clone();
    let x1 = fx.value("x", "1", b1.id);
    let x2 = fx.value("x", "2", b2.id);
    let prod = fx.env("prod", b1.id);
    let qa = fx.env("qa", b1.id);

    store
        .in_transaction(TxMode::Write, |tx| {
            tx.insert_config(WS, &config)?;
            tx.insert_blueprint(WS, config.id, &b1)?;
            tx.batch_insert_values(WS, config.id, std::slice::from_ref(&x1))?;
            tx.batch_insert_envs(WS, std::slice::from_ref(&prod))
        })
        .unwrap();

    let result = store.in_transaction(TxMode::Write, |tx| {
        tx.close_values_for_keys(WS, fx.project, b2.id, &["x".to_string()])?;
        tx.insert_blueprint(WS, config.id, &b2)?;
        tx.batch_insert_values(WS, config.id, std::slice::from_ref(&x2))?;
        tx.batch_update_envs(WS, fx.project, "bob", Utc::now(), &[EnvBinding::new("prod", b2.id)])?;
        tx.batch_insert_envs(WS, std::slice::from_ref(&qa))?;
        Err::<(), _>(StoreError::Backend("abort".into()))
    });
    assert!(result.is_err());

    store
        .in_transaction(TxMode::Read, |tx| {
            assert_eq!(tx.list_value_rows(WS, fx.project)?, vec![x1.clone()]);
            assert_eq!(tx.get_blueprint_by_id(WS, b2.id)?, None);
            assert_eq!(tx.get_blueprint_id_by_env(WS, fx.project, "prod")?, Some(b1.id));
            assert_eq!(tx.get_blueprint_id_by_env(WS, fx.project, "qa")?, None);

            let envs = tx.get_envs_by_names(WS, fx.project, &["prod".into()])?;
            assert_eq!(envs, vec![prod.clone()]);
            Ok::<_, StoreError>(())
        })
        .unwrap();
}

macro_rules! backend_tests {
    ($module:ident, $make:expr) => {
        mod $module {
            use super::*;

            #[test]
            fn close_then_insert() {
                close_then_insert_tracks_intervals(&$make);
            }

            #[test]
            fn latest_history_kinds() {
                latest_history_and_kinds(&$make);
            }

            #[test]
            fn env_updates() {
                env_update_in_place(&$make);
            }

            #[test]
            fn zero_width_rows() {
                zero_width_rows_never_resolve(&$make);
            }

            #[test]
            fn config_by_id() {
                config_lookup_by_id(&$make);
            }

            #[test]
            fn rollback_restores_state() {
                failed_write_restores_closed_rows_and_pins(&$make);
            }
        }
    };
}

backend_tests!(memory, MemoryStore::new());
backend_tests!(sqlite, SqliteStore::open_in_memory().unwrap());
