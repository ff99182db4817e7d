//! Testing utilities for the agent config workspace
//!
//! Shared fixtures for building services over either store backend.

#![allow(missing_docs)]

use agentcfg_core::{AgentConfigService, InMemoryProjectDirectory, MaskBindingPolicy};
use agentcfg_model::{
    Blueprint, BlueprintDraft, CreateConfigRequest, EnvBinding, EnvUpdateRequest, NewValue,
    ProjectId, RequestIdentity, ValueType,
};
use agentcfg_store::{MemoryStore, SqliteStore};
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;

pub const WORKSPACE: &str = "ws-test";
pub const USER: &str = "tester";

pub fn identity() -> RequestIdentity {
    RequestIdentity::new(WORKSPACE, USER)
}

pub fn memory_service() -> AgentConfigService<MemoryStore> {
    AgentConfigService::new(MemoryStore::new(), Arc::new(InMemoryProjectDirectory::new()))
}

/// SQLite-backed service with its database inside `dir`
pub fn sqlite_service(dir: &TempDir) -> AgentConfigService<SqliteStore> {
    let store = SqliteStore::open_path(dir.path().join("agentcfg.db")).unwrap();
    AgentConfigService::new(store, Arc::new(InMemoryProjectDirectory::new()))
}

pub fn deferring_memory_service() -> AgentConfigService<MemoryStore> {
    memory_service().with_mask_binding(MaskBindingPolicy::Defer)
}

/// String-typed values from `(key, value)` pairs
pub fn values(pairs: &[(&str, &str)]) -> Vec<NewValue> {
    pairs
        .iter()
        .map(|(key, value)| NewValue::new(*key, *value, ValueType::String))
        .collect()
}

pub fn blueprint_draft(pairs: &[(&str, &str)]) -> BlueprintDraft {
    BlueprintDraft::blueprint(values(pairs))
}

pub fn mask_draft(pairs: &[(&str, &str)]) -> BlueprintDraft {
    BlueprintDraft::mask(values(pairs))
}

pub fn create_by_name(project_name: &str, pairs: &[(&str, &str)]) -> CreateConfigRequest {
    CreateConfigRequest::for_project_name(project_name, blueprint_draft(pairs))
}

pub fn create_for(project_id: ProjectId, draft: BlueprintDraft) -> CreateConfigRequest {
    CreateConfigRequest::for_project(project_id, draft)
}

pub fn bind(project_id: ProjectId, bindings: &[(&str, &Blueprint)]) -> EnvUpdateRequest {
    EnvUpdateRequest::new(
        project_id,
        bindings
            .iter()
            .map(|(name, blueprint)| EnvBinding::new(*name, blueprint.id))
            .collect(),
    )
}

/// Key to value view of a resolved blueprint
pub fn value_map(blueprint: &Blueprint) -> BTreeMap<String, String> {
    blueprint
        .values
        .iter()
        .map(|v| (v.key.clone(), v.value.clone()))
        .collect()
}

pub fn expected(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}
