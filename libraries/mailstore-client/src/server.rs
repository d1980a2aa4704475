//! MailStore Server Administration API.
//!
//! One method per remote operation. Each builds the form arguments and hands
//! them to [`ApiClient::invoke`]; no server semantics live here.

use crate::client::{ApiClient, CallOptions};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::transport::{Arguments, HttpTransport, Transport};
use crate::types::TaskResponse;
use std::time::Duration;

/// Location and credentials of an archive store.
///
/// Which fields apply depends on the store type (`FileSystemInternal`,
/// `SQLServer`, `PostgreSQL`, ...). Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreOptions {
    pub store_type: Option<String>,
    pub database_name: Option<String>,
    pub database_path: Option<String>,
    pub content_path: Option<String>,
    pub index_path: Option<String>,
    pub server_name: Option<String>,
    pub user_name: Option<String>,
    pub password: Option<String>,
    pub requested_state: Option<String>,
}

impl StoreOptions {
    /// A file system based store in `database_path`.
    pub fn file_system(database_path: impl Into<String>) -> Self {
        Self {
            store_type: Some("FileSystemInternal".to_string()),
            database_path: Some(database_path.into()),
            ..Self::default()
        }
    }

    fn apply(&self, args: Arguments) -> Arguments {
        args.opt("type", self.store_type.as_deref())
            .opt("databaseName", self.database_name.as_deref())
            .opt("databasePath", self.database_path.as_deref())
            .opt("contentPath", self.content_path.as_deref())
            .opt("indexPath", self.index_path.as_deref())
            .opt("serverName", self.server_name.as_deref())
            .opt("userName", self.user_name.as_deref())
            .opt("password", self.password.as_deref())
    }
}

/// Optional attributes of a new user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserOptions {
    pub full_name: Option<String>,
    pub distinguished_name: Option<String>,
    /// `integrated` or `directoryServices`
    pub authentication: Option<String>,
    pub password: Option<String>,
}

impl UserOptions {
    pub(crate) fn apply(&self, args: Arguments) -> Arguments {
        args.opt("fullName", self.full_name.as_deref())
            .opt("distinguishedName", self.distinguished_name.as_deref())
            .opt("authentication", self.authentication.as_deref())
            .opt("password", self.password.as_deref())
    }
}

/// Client for the Administration API of a MailStore Server.
///
/// # Example
///
/// ```ignore
/// use mailstore_client::{CallOptions, ClientConfig, ServerClient};
///
/// let server = ServerClient::new(ClientConfig::new("archive.local", "admin", "secret"))?;
/// let info = server.get_server_info().await?;
///
/// // Keep the status token of a long running task instead of waiting for it
/// let verify = server
///     .with_call_options(CallOptions::new().auto_handle_token(false))
///     .verify_store(3)
///     .await?;
/// server.cancel_async(&verify).await?;
/// ```
pub struct ServerClient<T = HttpTransport> {
    api: ApiClient<T>,
    options: CallOptions,
}

impl<T> Clone for ServerClient<T> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            options: self.options.clone(),
        }
    }
}

impl ServerClient<HttpTransport> {
    pub fn new(config: ClientConfig) -> Result<Self> {
        ApiClient::new(config).map(Self::from_api)
    }
}

impl<T: Transport> ServerClient<T> {
    pub fn from_api(api: ApiClient<T>) -> Self {
        Self {
            api,
            options: CallOptions::default(),
        }
    }

    pub fn api(&self) -> &ApiClient<T> {
        &self.api
    }

    /// A client that applies `options` to every call it makes.
    pub fn with_call_options(&self, options: CallOptions) -> Self {
        Self {
            api: self.api.clone(),
            options,
        }
    }

    /// Invoke an operation that has no dedicated method.
    pub async fn invoke(&self, method: &str, arguments: Arguments) -> Result<TaskResponse> {
        self.api.invoke(method, arguments, &self.options).await
    }

    pub async fn get_status(
        &self,
        response: &TaskResponse,
        wait_time: Option<Duration>,
    ) -> Result<TaskResponse> {
        self.api
            .get_status(response, wait_time, &self.options)
            .await
    }

    pub async fn cancel_async(&self, response: &TaskResponse) -> Result<TaskResponse> {
        self.api.cancel_async(response).await
    }

    pub async fn handle_token(&self, response: TaskResponse) -> Result<TaskResponse> {
        self.api.handle_token(response, &self.options).await
    }

    // =========================================================================
    // Archive stores
    // =========================================================================

    pub async fn attach_store(&self, name: &str, store: &StoreOptions) -> Result<TaskResponse> {
        let args = store
            .apply(Arguments::new().arg("name", name))
            .opt("requestedState", store.requested_state.as_deref());
        self.invoke("AttachStore", args).await
    }

    pub async fn create_store(
        &self,
        name: Option<&str>,
        store: &StoreOptions,
    ) -> Result<TaskResponse> {
        let args = store
            .apply(Arguments::new().opt("name", name))
            .opt("requestedState", store.requested_state.as_deref());
        self.invoke("CreateStore", args).await
    }

    pub async fn compact_store(&self, id: i64) -> Result<TaskResponse> {
        self.invoke("CompactStore", Arguments::new().arg("id", id))
            .await
    }

    pub async fn detach_store(&self, id: i64) -> Result<TaskResponse> {
        self.invoke("DetachStore", Arguments::new().arg("id", id))
            .await
    }

    pub async fn get_stores(&self) -> Result<TaskResponse> {
        self.invoke("GetStores", Arguments::new()).await
    }

    pub async fn get_store_indexes(&self, id: i64) -> Result<TaskResponse> {
        self.invoke("GetStoreIndexes", Arguments::new().arg("id", id))
            .await
    }

    pub async fn merge_store(&self, id: i64, source_id: i64) -> Result<TaskResponse> {
        let args = Arguments::new().arg("id", id).arg("sourceId", source_id);
        self.invoke("MergeStore", args).await
    }

    /// Rebuild the full-text index of `folder` (an archive, e.g. `johndoe`).
    pub async fn rebuild_store_index(&self, id: i64, folder: &str) -> Result<TaskResponse> {
        let args = Arguments::new().arg("id", id).arg("folder", folder);
        self.invoke("RebuildStoreIndex", args).await
    }

    pub async fn refresh_all_store_statistics(&self) -> Result<TaskResponse> {
        self.invoke("RefreshAllStoreStatistics", Arguments::new())
            .await
    }

    pub async fn rename_store(&self, id: i64, name: &str) -> Result<TaskResponse> {
        let args = Arguments::new().arg("id", id).arg("name", name);
        self.invoke("RenameStore", args).await
    }

    pub async fn retry_open_stores(&self) -> Result<TaskResponse> {
        self.invoke("RetryOpenStores", Arguments::new()).await
    }

    /// Change type, location or credentials of a store. `requested_state` is ignored.
    pub async fn set_store_properties(
        &self,
        id: i64,
        store: &StoreOptions,
    ) -> Result<TaskResponse> {
        let args = store.apply(Arguments::new().arg("id", id));
        self.invoke("SetStoreProperties", args).await
    }

    /// `requested_state` is one of `current`, `normal`, `writeProtected`, `disabled`.
    pub async fn set_store_requested_state(
        &self,
        id: i64,
        requested_state: &str,
    ) -> Result<TaskResponse> {
        let args = Arguments::new()
            .arg("id", id)
            .arg("requestedState", requested_state);
        self.invoke("SetStoreRequestedState", args).await
    }

    pub async fn upgrade_store(&self, id: i64) -> Result<TaskResponse> {
        self.invoke("UpgradeStore", Arguments::new().arg("id", id))
            .await
    }

    pub async fn verify_store(&self, id: i64) -> Result<TaskResponse> {
        self.invoke("VerifyStore", Arguments::new().arg("id", id))
            .await
    }

    pub async fn compact_master_database(&self) -> Result<TaskResponse> {
        self.invoke("CompactMasterDatabase", Arguments::new()).await
    }

    pub async fn maintain_file_system_databases(&self) -> Result<TaskResponse> {
        self.invoke("MaintainFileSystemDatabases", Arguments::new())
            .await
    }

    // =========================================================================
    // Folders and messages
    // =========================================================================

    pub async fn get_child_folders(
        &self,
        folder: Option<&str>,
        max_levels: Option<u32>,
    ) -> Result<TaskResponse> {
        let args = Arguments::new()
            .opt("folder", folder)
            .opt("maxLevels", max_levels);
        self.invoke("GetChildFolders", args).await
    }

    pub async fn get_folder_statistics(&self) -> Result<TaskResponse> {
        self.invoke("GetFolderStatistics", Arguments::new()).await
    }

    pub async fn get_messages(&self, folder: &str) -> Result<TaskResponse> {
        self.invoke("GetMessages", Arguments::new().arg("folder", folder))
            .await
    }

    /// `id` has the form `<store_id>:<message_num>`.
    pub async fn delete_message(&self, id: &str) -> Result<TaskResponse> {
        self.invoke("DeleteMessage", Arguments::new().arg("id", id))
            .await
    }

    pub async fn delete_empty_folders(&self, folder: Option<&str>) -> Result<TaskResponse> {
        self.invoke("DeleteEmptyFolders", Arguments::new().opt("folder", folder))
            .await
    }

    pub async fn move_folder(&self, from_folder: &str, to_folder: &str) -> Result<TaskResponse> {
        let args = Arguments::new()
            .arg("fromFolder", from_folder)
            .arg("toFolder", to_folder);
        self.invoke("MoveFolder", args).await
    }

    // =========================================================================
    // Profiles
    // =========================================================================

    pub async fn create_profile(&self, properties: &str, raw: bool) -> Result<TaskResponse> {
        let args = Arguments::new()
            .arg("properties", properties)
            .flag("raw", raw);
        self.invoke("CreateProfile", args).await
    }

    pub async fn delete_profile(&self, id: i64) -> Result<TaskResponse> {
        self.invoke("DeleteProfile", Arguments::new().arg("id", id))
            .await
    }

    pub async fn get_profiles(&self, raw: bool) -> Result<TaskResponse> {
        self.invoke("GetProfiles", Arguments::new().flag("raw", raw))
            .await
    }

    pub async fn run_profile(&self, id: i64) -> Result<TaskResponse> {
        self.invoke("RunProfile", Arguments::new().arg("id", id))
            .await
    }

    pub async fn run_temporary_profile(&self, properties: &str, raw: bool) -> Result<TaskResponse> {
        let args = Arguments::new()
            .arg("properties", properties)
            .flag("raw", raw);
        self.invoke("RunTemporaryProfile", args).await
    }

    /// Finished profile runs between two timestamps (`2013-01-01T00:00:00`).
    ///
    /// `time_zone_id` defaults to `$Local`.
    pub async fn get_worker_results(
        &self,
        from_including: &str,
        to_excluding: &str,
        time_zone_id: Option<&str>,
        profile_id: Option<i64>,
        user_name: Option<&str>,
    ) -> Result<TaskResponse> {
        let args = Arguments::new()
            .arg("fromIncluding", from_including)
            .arg("toExcluding", to_excluding)
            .arg("timeZoneID", time_zone_id.unwrap_or("$Local"))
            .opt("profileID", profile_id)
            .opt("userName", user_name);
        self.invoke("GetWorkerResults", args).await
    }

    // =========================================================================
    // Users
    // =========================================================================

    pub async fn create_user<S: AsRef<str>>(
        &self,
        user_name: &str,
        privileges: &[S],
        user: &UserOptions,
    ) -> Result<TaskResponse> {
        let args = Arguments::new()
            .arg("userName", user_name)
            .list("privileges", privileges);
        self.invoke("CreateUser", user.apply(args)).await
    }

    pub async fn delete_user(&self, user_name: &str) -> Result<TaskResponse> {
        self.invoke("DeleteUser", Arguments::new().arg("userName", user_name))
            .await
    }

    pub async fn get_user_info(&self, user_name: &str) -> Result<TaskResponse> {
        self.invoke("GetUserInfo", Arguments::new().arg("userName", user_name))
            .await
    }

    pub async fn get_users(&self) -> Result<TaskResponse> {
        self.invoke("GetUsers", Arguments::new()).await
    }

    pub async fn rename_user(
        &self,
        old_user_name: &str,
        new_user_name: &str,
    ) -> Result<TaskResponse> {
        let args = Arguments::new()
            .arg("oldUserName", old_user_name)
            .arg("newUserName", new_user_name);
        self.invoke("RenameUser", args).await
    }

    pub async fn set_user_authentication(
        &self,
        user_name: &str,
        authentication: &str,
    ) -> Result<TaskResponse> {
        let args = Arguments::new()
            .arg("userName", user_name)
            .arg("authentication", authentication);
        self.invoke("SetUserAuthentication", args).await
    }

    pub async fn set_user_distinguished_name(
        &self,
        user_name: &str,
        distinguished_name: Option<&str>,
    ) -> Result<TaskResponse> {
        let args = Arguments::new()
            .arg("userName", user_name)
            .opt("distinguishedName", distinguished_name);
        self.invoke("SetUserDistinguishedName", args).await
    }

    pub async fn set_user_email_addresses<S: AsRef<str>>(
        &self,
        user_name: &str,
        email_addresses: &[S],
    ) -> Result<TaskResponse> {
        let args = Arguments::new()
            .arg("userName", user_name)
            .list("emailAddresses", email_addresses);
        self.invoke("SetUserEmailAddresses", args).await
    }

    pub async fn set_user_full_name(
        &self,
        user_name: &str,
        full_name: Option<&str>,
    ) -> Result<TaskResponse> {
        let args = Arguments::new()
            .arg("userName", user_name)
            .opt("fullName", full_name);
        self.invoke("SetUserFullName", args).await
    }

    pub async fn set_user_password(&self, user_name: &str, password: &str) -> Result<TaskResponse> {
        let args = Arguments::new()
            .arg("userName", user_name)
            .arg("password", password);
        self.invoke("SetUserPassword", args).await
    }

    pub async fn set_user_pop3_user_names<S: AsRef<str>>(
        &self,
        user_name: &str,
        pop3_user_names: &[S],
    ) -> Result<TaskResponse> {
        let args = Arguments::new()
            .arg("userName", user_name)
            .list("pop3UserNames", pop3_user_names);
        self.invoke("SetUserPop3UserNames", args).await
    }

    pub async fn set_user_privileges<S: AsRef<str>>(
        &self,
        user_name: &str,
        privileges: &[S],
    ) -> Result<TaskResponse> {
        let args = Arguments::new()
            .arg("userName", user_name)
            .list("privileges", privileges);
        self.invoke("SetUserPrivileges", args).await
    }

    pub async fn set_user_privileges_on_folder<S: AsRef<str>>(
        &self,
        user_name: &str,
        folder: &str,
        privileges: &[S],
    ) -> Result<TaskResponse> {
        let args = Arguments::new()
            .arg("userName", user_name)
            .arg("folder", folder)
            .list("privileges", privileges);
        self.invoke("SetUserPrivilegesOnFolder", args).await
    }

    pub async fn clear_user_privileges_on_folders(&self, user_name: &str) -> Result<TaskResponse> {
        let args = Arguments::new().arg("userName", user_name);
        self.invoke("ClearUserPrivilegesOnFolders", args).await
    }

    pub async fn sync_users_with_directory_services(&self, dry_run: bool) -> Result<TaskResponse> {
        let args = Arguments::new().flag("dryRun", dry_run);
        self.invoke("SyncUsersWithDirectoryServices", args).await
    }

    // =========================================================================
    // Server configuration and information
    // =========================================================================

    pub async fn get_active_sessions(&self) -> Result<TaskResponse> {
        self.invoke("GetActiveSessions", Arguments::new()).await
    }

    pub async fn get_compliance_configuration(&self) -> Result<TaskResponse> {
        self.invoke("GetComplianceConfiguration", Arguments::new())
            .await
    }

    pub async fn set_compliance_configuration(&self, config: &str) -> Result<TaskResponse> {
        let args = Arguments::new().arg("config", config);
        self.invoke("SetComplianceConfiguration", args).await
    }

    pub async fn get_directory_services_configuration(&self) -> Result<TaskResponse> {
        self.invoke("GetDirectoryServicesConfiguration", Arguments::new())
            .await
    }

    pub async fn set_directory_services_configuration(&self, config: &str) -> Result<TaskResponse> {
        let args = Arguments::new().arg("config", config);
        self.invoke("SetDirectoryServicesConfiguration", args).await
    }

    pub async fn get_server_info(&self) -> Result<TaskResponse> {
        self.invoke("GetServerInfo", Arguments::new()).await
    }

    pub async fn get_time_zones(&self) -> Result<TaskResponse> {
        self.invoke("GetTimeZones", Arguments::new()).await
    }
}
