//! Agent config service
//!
//! Entry point for every operation. Each call runs in exactly one unit of
//! work; the project directory is consulted before a write unit opens.
//!
//! Store access is synchronous. Only the directory lookup in
//! [`AgentConfigService::create_or_update_config`] awaits; its unit of work
//! then runs on the calling thread. On an async runtime, share the service
//! through an `Arc` and run calls against a blocking backend such as
//! `SqliteStore` from `tokio::task::spawn_blocking`.

use crate::config::ServiceConfig;
use crate::directory::ProjectDirectory;
use crate::environment::{EnvironmentBinder, MaskBindingPolicy};
use crate::error::{BlueprintError, NotFoundError};
use crate::ids::{IdGenerator, MonotonicUlidGenerator};
use crate::mask::MaskApplier;
use crate::resolver::Resolver;
use crate::versioning::VersioningEngine;
use agentcfg_model::{
    Blueprint, BlueprintId, BlueprintPage, CreateConfigRequest, EnvUpdateRequest,
    EnvironmentBinding, PageRequest, ProjectId, RequestIdentity,
};
use agentcfg_store::{ConfigStore, StoreTx, TxMode};
use std::sync::Arc;

type Result<T> = std::result::Result<T, BlueprintError>;

/// Versioned agent configuration service
pub struct AgentConfigService<S: ConfigStore> {
    store: S,
    engine: VersioningEngine,
    resolver: Resolver,
    masks: MaskApplier,
    binder: EnvironmentBinder,
}

impl<S: ConfigStore> AgentConfigService<S> {
    /// Create service with a monotonic ULID generator and the default mask policy
    pub fn new(store: S, directory: Arc<dyn ProjectDirectory>) -> Self {
        Self::with_id_generator(store, directory, Arc::new(MonotonicUlidGenerator::new()))
    }

    /// Create service with an explicit id generator
    pub fn with_id_generator(
        store: S,
        directory: Arc<dyn ProjectDirectory>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            store,
            engine: VersioningEngine::new(directory, Arc::clone(&ids)),
            resolver: Resolver::new(),
            masks: MaskApplier::new(),
            binder: EnvironmentBinder::new(ids, MaskBindingPolicy::default()),
        }
    }

    /// Create service from loaded configuration
    pub fn from_config(store: S, directory: Arc<dyn ProjectDirectory>, config: &ServiceConfig) -> Self {
        Self::new(store, directory).with_mask_binding(config.environments.mask_binding)
    }

    /// Set the policy for environment pins that target masks
    #[must_use]
    pub fn with_mask_binding(mut self, policy: MaskBindingPolicy) -> Self {
        self.binder = EnvironmentBinder::new(self.engine.ids(), policy);
        self
    }

    /// Underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Append a blueprint or mask to a project's config
    ///
    /// Creates the config on first write. The project is resolved by ID, or
    /// fetched-or-created by name.
    ///
    /// The future blocks its thread while the write unit of work runs, for
    /// as long as the store takes to commit.
    ///
    /// # Errors
    /// Returns `InvalidArgument` for malformed requests, `NotFound` for an
    /// unknown project ID, and an internal error if a store invariant fails
    pub async fn create_or_update_config(
        &self,
        identity: &RequestIdentity,
        request: &CreateConfigRequest,
    ) -> Result<Blueprint> {
        let project_ref = request.validate()?;
        tracing::info!(
            "Creating {} in workspace '{}' by '{}'",
            request.blueprint.blueprint_type,
            identity.workspace_id,
            identity.user_name
        );

        let project = self
            .engine
            .resolve_project(identity, &project_ref)
            .await
            .map_err(log_internal)?;

        self.store
            .in_transaction(TxMode::Write, |tx| {
                self.engine
                    .append(tx, identity, &project, request.config_id, &request.blueprint)
            })
            .map_err(log_internal)
    }

    /// Latest `BLUEPRINT` of a project, optionally overlaid with a mask
    ///
    /// # Errors
    /// Returns `NotFound` if the project has no config or blueprint, or the
    /// mask is not a mask of the project
    pub fn get_latest_blueprint(
        &self,
        identity: &RequestIdentity,
        project_id: ProjectId,
        mask_id: Option<BlueprintId>,
    ) -> Result<Blueprint> {
        tracing::info!(
            "Getting latest blueprint for project '{}' in workspace '{}'",
            project_id,
            identity.workspace_id
        );
        self.read(|tx| {
            let blueprint =
                self.resolver
                    .resolve_effective(tx, &identity.workspace_id, project_id, None)?;
            self.masked(tx, identity, blueprint, mask_id)
        })
    }

    /// Effective values as of a specific `BLUEPRINT`
    ///
    /// The project is taken from the blueprint itself.
    ///
    /// # Errors
    /// Returns `NotFound` if the blueprint does not exist or is a mask, or the
    /// mask is not a mask of the blueprint's project
    pub fn get_blueprint_by_id(
        &self,
        identity: &RequestIdentity,
        blueprint_id: BlueprintId,
        mask_id: Option<BlueprintId>,
    ) -> Result<Blueprint> {
        tracing::info!(
            "Getting blueprint '{}' in workspace '{}'",
            blueprint_id,
            identity.workspace_id
        );
        self.read(|tx| {
            let project_id = tx
                .get_blueprint_by_id(&identity.workspace_id, blueprint_id)?
                .ok_or(NotFoundError::Blueprint(blueprint_id))?
                .project_id;
            let blueprint = self.resolver.resolve_effective(
                tx,
                &identity.workspace_id,
                project_id,
                Some(blueprint_id),
            )?;
            self.masked(tx, identity, blueprint, mask_id)
        })
    }

    /// Effective values of the blueprint an environment is pinned to
    ///
    /// # Errors
    /// Returns `NotFound` if the environment is unknown or pinned to a mask,
    /// or the mask is not a mask of the project
    pub fn get_blueprint_by_env(
        &self,
        identity: &RequestIdentity,
        project_id: ProjectId,
        env_name: &str,
        mask_id: Option<BlueprintId>,
    ) -> Result<Blueprint> {
        tracing::info!(
            "Getting blueprint for environment '{}' of project '{}' in workspace '{}'",
            env_name,
            project_id,
            identity.workspace_id
        );
        self.read(|tx| {
            let blueprint = self.resolver.resolve_by_environment(
                tx,
                &identity.workspace_id,
                project_id,
                env_name,
            )?;
            self.masked(tx, identity, blueprint, mask_id)
        })
    }

    /// Rows introduced by a blueprint or mask
    ///
    /// # Errors
    /// Returns `NotFound` if the blueprint does not exist
    pub fn get_delta_by_id(
        &self,
        identity: &RequestIdentity,
        blueprint_id: BlueprintId,
    ) -> Result<Blueprint> {
        tracing::info!(
            "Getting delta of blueprint '{}' in workspace '{}'",
            blueprint_id,
            identity.workspace_id
        );
        self.read(|tx| {
            self.resolver
                .resolve_delta(tx, &identity.workspace_id, blueprint_id)
        })
    }

    /// Create or re-point environment bindings
    ///
    /// # Errors
    /// Returns `InvalidArgument` for malformed requests, and `NotFound` if a
    /// target blueprint is missing, belongs to another project, or is a mask
    /// rejected by the binding policy
    pub fn create_or_update_envs(
        &self,
        identity: &RequestIdentity,
        request: &EnvUpdateRequest,
    ) -> Result<Vec<EnvironmentBinding>> {
        request.validate()?;
        tracing::info!(
            "Binding {} environments for project '{}' in workspace '{}'",
            request.envs.len(),
            request.project_id,
            identity.workspace_id
        );
        self.store
            .in_transaction(TxMode::Write, |tx| self.binder.bind(tx, identity, request))
            .map_err(log_internal)
    }

    /// One page of `BLUEPRINT` history, newest first
    ///
    /// # Errors
    /// Returns `InvalidArgument` for a zero page or an out-of-range size, and
    /// `NotFound` if the project has no config
    pub fn get_history(
        &self,
        identity: &RequestIdentity,
        project_id: ProjectId,
        page: u32,
        size: u32,
    ) -> Result<BlueprintPage> {
        let page = PageRequest::new(page, size)?;
        tracing::info!(
            "Getting history page {} for project '{}' in workspace '{}'",
            page.page(),
            project_id,
            identity.workspace_id
        );
        self.read(|tx| {
            self.resolver
                .history(tx, &identity.workspace_id, project_id, page)
        })
    }

    fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn StoreTx) -> Result<T>,
    {
        self.store
            .in_transaction(TxMode::Read, |tx| f(&*tx))
            .map_err(log_internal)
    }

    fn masked(
        &self,
        tx: &dyn StoreTx,
        identity: &RequestIdentity,
        mut blueprint: Blueprint,
        mask_id: Option<BlueprintId>,
    ) -> Result<Blueprint> {
        if let Some(mask_id) = mask_id {
            let values = std::mem::take(&mut blueprint.values);
            blueprint.values = self.masks.apply_mask(
                tx,
                &identity.workspace_id,
                values,
                mask_id,
                blueprint.project_id,
            )?;
        }
        Ok(blueprint)
    }
}

impl<S: ConfigStore + std::fmt::Debug> std::fmt::Debug for AgentConfigService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfigService")
            .field("store", &self.store)
            .field("binder", &self.binder)
            .finish_non_exhaustive()
    }
}

fn log_internal(err: BlueprintError) -> BlueprintError {
    if err.is_internal() {
        tracing::error!("Agent config operation failed: {}", err);
    }
    err
}
