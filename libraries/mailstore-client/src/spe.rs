//! MailStore Service Provider Edition Management API.
//!
//! The management server administers instances, instance hosts and client
//! access servers. Archive operations take the `instanceID` of the instance
//! they act on as first argument.

use crate::client::{ApiClient, CallOptions};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::server::UserOptions;
use crate::transport::{Arguments, HttpTransport, Transport};
use crate::types::TaskResponse;
use std::time::Duration;

/// Client for the Management API of MailStore SPE.
///
/// Configuration objects (`config` arguments) are passed as the JSON strings
/// the server expects.
pub struct SpeClient<T = HttpTransport> {
    api: ApiClient<T>,
    options: CallOptions,
}

impl<T> Clone for SpeClient<T> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            options: self.options.clone(),
        }
    }
}

impl SpeClient<HttpTransport> {
    /// `config` should be based on [`ClientConfig::spe`] for the default port.
    pub fn new(config: ClientConfig) -> Result<Self> {
        ApiClient::new(config).map(Self::from_api)
    }
}

fn instance(instance_id: &str) -> Arguments {
    Arguments::new().arg("instanceID", instance_id)
}

fn filter(instance_filter: &str) -> Arguments {
    Arguments::new().arg("instanceFilter", instance_filter)
}

fn config(config: &str) -> Arguments {
    Arguments::new().arg("config", config)
}

impl<T: Transport> SpeClient<T> {
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
    // Management server
    // =========================================================================

    pub async fn get_environment_info(&self) -> Result<TaskResponse> {
        self.invoke("GetEnvironmentInfo", Arguments::new()).await
    }

    pub async fn get_service_status(&self) -> Result<TaskResponse> {
        self.invoke("GetServiceStatus", Arguments::new()).await
    }

    pub async fn ping(&self) -> Result<TaskResponse> {
        self.invoke("Ping", Arguments::new()).await
    }

    pub async fn create_license_request(&self) -> Result<TaskResponse> {
        self.invoke("CreateLicenseRequest", Arguments::new()).await
    }

    pub async fn pair_with_management_server(
        &self,
        server_type: &str,
        server_name: &str,
        port: u16,
        thumbprint: &str,
    ) -> Result<TaskResponse> {
        let args = Arguments::new()
            .arg("serverType", server_type)
            .arg("serverName", server_name)
            .arg("port", port)
            .arg("thumbprint", thumbprint);
        self.invoke("PairWithManagementServer", args).await
    }

    // =========================================================================
    // System administrators
    // =========================================================================

    pub async fn create_system_administrator(
        &self,
        config_json: &str,
        password: &str,
    ) -> Result<TaskResponse> {
        let args = config(config_json).arg("password", password);
        self.invoke("CreateSystemAdministrator", args).await
    }

    pub async fn delete_system_administrator(&self, user_name: &str) -> Result<TaskResponse> {
        let args = Arguments::new().arg("userName", user_name);
        self.invoke("DeleteSystemAdministrator", args).await
    }

    pub async fn get_system_administrators(&self) -> Result<TaskResponse> {
        self.invoke("GetSystemAdministrators", Arguments::new())
            .await
    }

    pub async fn set_system_administrator_configuration(
        &self,
        config_json: &str,
    ) -> Result<TaskResponse> {
        self.invoke("SetSystemAdministratorConfiguration", config(config_json))
            .await
    }

    pub async fn set_system_administrator_password(
        &self,
        user_name: &str,
        password: &str,
    ) -> Result<TaskResponse> {
        let args = Arguments::new()
            .arg("userName", user_name)
            .arg("password", password);
        self.invoke("SetSystemAdministratorPassword", args).await
    }

    // =========================================================================
    // Instance hosts and client access servers
    // =========================================================================

    pub async fn create_instance_host(&self, config_json: &str) -> Result<TaskResponse> {
        self.invoke("CreateInstanceHost", config(config_json)).await
    }

    pub async fn delete_instance_host(&self, server_name: &str) -> Result<TaskResponse> {
        let args = Arguments::new().arg("serverName", server_name);
        self.invoke("DeleteInstanceHost", args).await
    }

    pub async fn get_instance_hosts(
        &self,
        server_name_filter: Option<&str>,
    ) -> Result<TaskResponse> {
        let args = Arguments::new().opt("serverNameFilter", server_name_filter);
        self.invoke("GetInstanceHosts", args).await
    }

    pub async fn set_instance_host_configuration(&self, config_json: &str) -> Result<TaskResponse> {
        self.invoke("SetInstanceHostConfiguration", config(config_json))
            .await
    }

    pub async fn create_directory_on_instance_host(
        &self,
        server_name: &str,
        path: &str,
    ) -> Result<TaskResponse> {
        let args = Arguments::new()
            .arg("serverName", server_name)
            .arg("path", path);
        self.invoke("CreateDirectoryOnInstanceHost", args).await
    }

    pub async fn get_directories_on_instance_host(
        &self,
        server_name: &str,
        path: Option<&str>,
    ) -> Result<TaskResponse> {
        let args = Arguments::new()
            .arg("serverName", server_name)
            .opt("path", path);
        self.invoke("GetDirectoriesOnInstanceHost", args).await
    }

    pub async fn create_client_access_server(&self, config_json: &str) -> Result<TaskResponse> {
        self.invoke("CreateClientAccessServer", config(config_json))
            .await
    }

    pub async fn delete_client_access_server(&self, server_name: &str) -> Result<TaskResponse> {
        let args = Arguments::new().arg("serverName", server_name);
        self.invoke("DeleteClientAccessServer", args).await
    }

    pub async fn get_client_access_servers(
        &self,
        with_service_status: bool,
        server_name_filter: Option<&str>,
    ) -> Result<TaskResponse> {
        let args = Arguments::new()
            .opt("serverNameFilter", server_name_filter)
            .flag("withServiceStatus", with_service_status);
        self.invoke("GetClientAccessServers", args).await
    }

    pub async fn set_client_access_server_configuration(
        &self,
        config_json: &str,
    ) -> Result<TaskResponse> {
        self.invoke("SetClientAccessServerConfiguration", config(config_json))
            .await
    }

    // =========================================================================
    // Instances
    // =========================================================================

    pub async fn create_instance(&self, config_json: &str) -> Result<TaskResponse> {
        self.invoke("CreateInstance", config(config_json)).await
    }

    /// `instance_filter` accepts wildcards, e.g. `*` or `acme-*`.
    pub async fn get_instances(&self, instance_filter: &str) -> Result<TaskResponse> {
        self.invoke("GetInstances", filter(instance_filter)).await
    }

    pub async fn delete_instances(&self, instance_filter: &str) -> Result<TaskResponse> {
        self.invoke("DeleteInstances", filter(instance_filter)).await
    }

    pub async fn start_instances(&self, instance_filter: &str) -> Result<TaskResponse> {
        self.invoke("StartInstances", filter(instance_filter)).await
    }

    pub async fn stop_instances(&self, instance_filter: &str) -> Result<TaskResponse> {
        self.invoke("StopInstances", filter(instance_filter)).await
    }

    pub async fn restart_instances(&self, instance_filter: &str) -> Result<TaskResponse> {
        self.invoke("RestartInstances", filter(instance_filter)).await
    }

    pub async fn freeze_instances(&self, instance_filter: &str) -> Result<TaskResponse> {
        self.invoke("FreezeInstances", filter(instance_filter)).await
    }

    pub async fn thaw_instances(&self, instance_filter: &str) -> Result<TaskResponse> {
        self.invoke("ThawInstances", filter(instance_filter)).await
    }

    pub async fn get_instance_configuration(&self, instance_id: &str) -> Result<TaskResponse> {
        self.invoke("GetInstanceConfiguration", instance(instance_id))
            .await
    }

    pub async fn set_instance_configuration(&self, config_json: &str) -> Result<TaskResponse> {
        self.invoke("SetInstanceConfiguration", config(config_json))
            .await
    }

    pub async fn get_instance_statistics(&self, instance_id: &str) -> Result<TaskResponse> {
        self.invoke("GetInstanceStatistics", instance(instance_id))
            .await
    }

    pub async fn get_instance_process_live_statistics(
        &self,
        instance_id: &str,
    ) -> Result<TaskResponse> {
        self.invoke("GetInstanceProcessLiveStatistics", instance(instance_id))
            .await
    }

    pub async fn get_archive_admin_enabled(&self, instance_id: &str) -> Result<TaskResponse> {
        self.invoke("GetArchiveAdminEnabled", instance(instance_id))
            .await
    }

    pub async fn set_archive_admin_enabled(
        &self,
        instance_id: &str,
        enabled: bool,
    ) -> Result<TaskResponse> {
        let args = instance(instance_id).flag("enabled", enabled);
        self.invoke("SetArchiveAdminEnabled", args).await
    }

    pub async fn create_client_one_time_url_for_archive_admin(
        &self,
        instance_id: &str,
        instance_url: Option<&str>,
    ) -> Result<TaskResponse> {
        let args = instance(instance_id).opt("instanceUrl", instance_url);
        self.invoke("CreateClientOneTimeUrlForArchiveAdmin", args)
            .await
    }

    // =========================================================================
    // Archive stores
    // =========================================================================

    pub async fn attach_store(
        &self,
        instance_id: &str,
        name: &str,
        path: &str,
        requested_state: Option<&str>,
    ) -> Result<TaskResponse> {
        let args = instance(instance_id)
            .arg("name", name)
            .arg("path", path)
            .opt("requestedState", requested_state);
        self.invoke("AttachStore", args).await
    }

    pub async fn create_store(
        &self,
        instance_id: &str,
        name: &str,
        path: &str,
        requested_state: Option<&str>,
    ) -> Result<TaskResponse> {
        let args = instance(instance_id)
            .arg("name", name)
            .arg("path", path)
            .opt("requestedState", requested_state);
        self.invoke("CreateStore", args).await
    }

    pub async fn compact_store(&self, instance_id: &str, id: i64) -> Result<TaskResponse> {
        self.invoke("CompactStore", instance(instance_id).arg("id", id))
            .await
    }

    pub async fn detach_store(&self, instance_id: &str, id: i64) -> Result<TaskResponse> {
        self.invoke("DetachStore", instance(instance_id).arg("id", id))
            .await
    }

    pub async fn get_stores(&self, instance_id: &str) -> Result<TaskResponse> {
        self.invoke("GetStores", instance(instance_id)).await
    }

    pub async fn merge_store(
        &self,
        instance_id: &str,
        id: i64,
        source_id: i64,
    ) -> Result<TaskResponse> {
        let args = instance(instance_id)
            .arg("id", id)
            .arg("sourceId", source_id);
        self.invoke("MergeStore", args).await
    }

    pub async fn rename_store(
        &self,
        instance_id: &str,
        id: i64,
        name: &str,
    ) -> Result<TaskResponse> {
        let args = instance(instance_id).arg("id", id).arg("name", name);
        self.invoke("RenameStore", args).await
    }

    pub async fn set_store_path(
        &self,
        instance_id: &str,
        id: i64,
        path: &str,
    ) -> Result<TaskResponse> {
        let args = instance(instance_id).arg("id", id).arg("path", path);
        self.invoke("SetStorePath", args).await
    }

    pub async fn set_store_requested_state(
        &self,
        instance_id: &str,
        id: i64,
        requested_state: &str,
    ) -> Result<TaskResponse> {
        let args = instance(instance_id)
            .arg("id", id)
            .arg("requestedState", requested_state);
        self.invoke("SetStoreRequestedState", args).await
    }

    pub async fn upgrade_store(&self, instance_id: &str, id: i64) -> Result<TaskResponse> {
        self.invoke("UpgradeStore", instance(instance_id).arg("id", id))
            .await
    }

    pub async fn verify_store(&self, instance_id: &str, id: i64) -> Result<TaskResponse> {
        self.invoke("VerifyStore", instance(instance_id).arg("id", id))
            .await
    }

    pub async fn refresh_all_store_statistics(&self, instance_id: &str) -> Result<TaskResponse> {
        self.invoke("RefreshAllStoreStatistics", instance(instance_id))
            .await
    }

    pub async fn retry_open_stores(&self, instance_id: &str) -> Result<TaskResponse> {
        self.invoke("RetryOpenStores", instance(instance_id)).await
    }

    pub async fn maintain_file_system_databases(&self, instance_id: &str) -> Result<TaskResponse> {
        self.invoke("MaintainFileSystemDatabases", instance(instance_id))
            .await
    }

    pub async fn get_store_auto_create_configuration(
        &self,
        instance_id: &str,
    ) -> Result<TaskResponse> {
        self.invoke("GetStoreAutoCreateConfiguration", instance(instance_id))
            .await
    }

    pub async fn set_store_auto_create_configuration(
        &self,
        instance_id: &str,
        config_json: &str,
    ) -> Result<TaskResponse> {
        let args = instance(instance_id).arg("config", config_json);
        self.invoke("SetStoreAutoCreateConfiguration", args).await
    }

    // =========================================================================
    // Full-text indexes
    // =========================================================================

    pub async fn get_index_configuration(&self, instance_id: &str) -> Result<TaskResponse> {
        self.invoke("GetIndexConfiguration", instance(instance_id))
            .await
    }

    pub async fn set_index_configuration(
        &self,
        instance_id: &str,
        config_json: &str,
    ) -> Result<TaskResponse> {
        let args = instance(instance_id).arg("config", config_json);
        self.invoke("SetIndexConfiguration", args).await
    }

    pub async fn select_all_store_indexes_for_rebuild(
        &self,
        instance_id: &str,
    ) -> Result<TaskResponse> {
        self.invoke("SelectAllStoreIndexesForRebuild", instance(instance_id))
            .await
    }

    pub async fn rebuild_selected_store_indexes(&self, instance_id: &str) -> Result<TaskResponse> {
        self.invoke("RebuildSelectedStoreIndexes", instance(instance_id))
            .await
    }

    // =========================================================================
    // Folders and messages
    // =========================================================================

    pub async fn get_child_folders(
        &self,
        instance_id: &str,
        folder: Option<&str>,
        max_levels: Option<u32>,
    ) -> Result<TaskResponse> {
        let args = instance(instance_id)
            .opt("folder", folder)
            .opt("maxLevels", max_levels);
        self.invoke("GetChildFolders", args).await
    }

    pub async fn get_folder_statistics(&self, instance_id: &str) -> Result<TaskResponse> {
        self.invoke("GetFolderStatistics", instance(instance_id))
            .await
    }

    pub async fn get_messages(&self, instance_id: &str, folder: &str) -> Result<TaskResponse> {
        self.invoke("GetMessages", instance(instance_id).arg("folder", folder))
            .await
    }

    pub async fn delete_message(&self, instance_id: &str, id: &str) -> Result<TaskResponse> {
        self.invoke("DeleteMessage", instance(instance_id).arg("id", id))
            .await
    }

    pub async fn delete_empty_folders(
        &self,
        instance_id: &str,
        folder: Option<&str>,
    ) -> Result<TaskResponse> {
        let args = instance(instance_id).opt("folder", folder);
        self.invoke("DeleteEmptyFolders", args).await
    }

    pub async fn move_folder(
        &self,
        instance_id: &str,
        from_folder: &str,
        to_folder: &str,
    ) -> Result<TaskResponse> {
        let args = instance(instance_id)
            .arg("fromFolder", from_folder)
            .arg("toFolder", to_folder);
        self.invoke("MoveFolder", args).await
    }

    // =========================================================================
    // Profiles
    // =========================================================================

    pub async fn create_profile(
        &self,
        instance_id: &str,
        properties: &str,
        raw: bool,
    ) -> Result<TaskResponse> {
        let args = instance(instance_id)
            .arg("properties", properties)
            .flag("raw", raw);
        self.invoke("CreateProfile", args).await
    }

    pub async fn delete_profile(&self, instance_id: &str, id: i64) -> Result<TaskResponse> {
        self.invoke("DeleteProfile", instance(instance_id).arg("id", id))
            .await
    }

    pub async fn get_profiles(&self, instance_id: &str, raw: bool) -> Result<TaskResponse> {
        self.invoke("GetProfiles", instance(instance_id).flag("raw", raw))
            .await
    }

    pub async fn run_profile(&self, instance_id: &str, id: i64) -> Result<TaskResponse> {
        self.invoke("RunProfile", instance(instance_id).arg("id", id))
            .await
    }

    pub async fn run_temporary_profile(
        &self,
        instance_id: &str,
        properties: &str,
        raw: bool,
    ) -> Result<TaskResponse> {
        let args = instance(instance_id)
            .arg("properties", properties)
            .flag("raw", raw);
        self.invoke("RunTemporaryProfile", args).await
    }

    pub async fn get_worker_results(
        &self,
        instance_id: &str,
        from_including: &str,
        to_excluding: &str,
        time_zone_id: &str,
        profile_id: Option<i64>,
        user_name: Option<&str>,
    ) -> Result<TaskResponse> {
        let args = instance(instance_id)
            .arg("fromIncluding", from_including)
            .arg("toExcluding", to_excluding)
            .arg("timeZoneID", time_zone_id)
            .opt("profileID", profile_id)
            .opt("userName", user_name);
        self.invoke("GetWorkerResults", args).await
    }

    // =========================================================================
    // Users
    // =========================================================================

    pub async fn create_user<S: AsRef<str>>(
        &self,
        instance_id: &str,
        user_name: &str,
        privileges: &[S],
        user: &UserOptions,
    ) -> Result<TaskResponse> {
        let args = instance(instance_id)
            .arg("userName", user_name)
            .list("privileges", privileges);
        self.invoke("CreateUser", user.apply(args)).await
    }

    pub async fn delete_user(&self, instance_id: &str, user_name: &str) -> Result<TaskResponse> {
        let args = instance(instance_id).arg("userName", user_name);
        self.invoke("DeleteUser", args).await
    }

    pub async fn get_user_info(&self, instance_id: &str, user_name: &str) -> Result<TaskResponse> {
        let args = instance(instance_id).arg("userName", user_name);
        self.invoke("GetUserInfo", args).await
    }

    pub async fn get_users(&self, instance_id: &str) -> Result<TaskResponse> {
        self.invoke("GetUsers", instance(instance_id)).await
    }

    pub async fn rename_user(
        &self,
        instance_id: &str,
        old_user_name: &str,
        new_user_name: &str,
    ) -> Result<TaskResponse> {
        let args = instance(instance_id)
            .arg("oldUserName", old_user_name)
            .arg("newUserName", new_user_name);
        self.invoke("RenameUser", args).await
    }

    pub async fn set_user_authentication(
        &self,
        instance_id: &str,
        user_name: &str,
        authentication: &str,
    ) -> Result<TaskResponse> {
        let args = instance(instance_id)
            .arg("userName", user_name)
            .arg("authentication", authentication);
        self.invoke("SetUserAuthentication", args).await
    }

    pub async fn set_user_distinguished_name(
        &self,
        instance_id: &str,
        user_name: &str,
        distinguished_name: Option<&str>,
    ) -> Result<TaskResponse> {
        let args = instance(instance_id)
            .arg("userName", user_name)
            .opt("distinguishedName", distinguished_name);
        self.invoke("SetUserDistinguishedName", args).await
    }

    pub async fn set_user_email_addresses<S: AsRef<str>>(
        &self,
        instance_id: &str,
        user_name: &str,
        email_addresses: &[S],
    ) -> Result<TaskResponse> {
        let args = instance(instance_id)
            .arg("userName", user_name)
            .list("emailAddresses", email_addresses);
        self.invoke("SetUserEmailAddresses", args).await
    }

    pub async fn set_user_full_name(
        &self,
        instance_id: &str,
        user_name: &str,
        full_name: Option<&str>,
    ) -> Result<TaskResponse> {
        let args = instance(instance_id)
            .arg("userName", user_name)
            .opt("fullName", full_name);
        self.invoke("SetUserFullName", args).await
    }

    pub async fn set_user_password(
        &self,
        instance_id: &str,
        user_name: &str,
        password: &str,
    ) -> Result<TaskResponse> {
        let args = instance(instance_id)
            .arg("userName", user_name)
            .arg("password", password);
        self.invoke("SetUserPassword", args).await
    }

    pub async fn set_user_pop3_user_names<S: AsRef<str>>(
        &self,
        instance_id: &str,
        user_name: &str,
        pop3_user_names: &[S],
    ) -> Result<TaskResponse> {
        let args = instance(instance_id)
            .arg("userName", user_name)
            .list("pop3UserNames", pop3_user_names);
        self.invoke("SetUserPop3UserNames", args).await
    }

    pub async fn set_user_privileges<S: AsRef<str>>(
        &self,
        instance_id: &str,
        user_name: &str,
        privileges: &[S],
    ) -> Result<TaskResponse> {
        let args = instance(instance_id)
            .arg("userName", user_name)
            .list("privileges", privileges);
        self.invoke("SetUserPrivileges", args).await
    }

    pub async fn set_user_privileges_on_folder<S: AsRef<str>>(
        &self,
        instance_id: &str,
        user_name: &str,
        folder: &str,
        privileges: &[S],
    ) -> Result<TaskResponse> {
        let args = instance(instance_id)
            .arg("userName", user_name)
            .arg("folder", folder)
            .list("privileges", privileges);
        self.invoke("SetUserPrivilegesOnFolder", args).await
    }

    pub async fn clear_user_privileges_on_folders(
        &self,
        instance_id: &str,
        user_name: &str,
    ) -> Result<TaskResponse> {
        let args = instance(instance_id).arg("userName", user_name);
        self.invoke("ClearUserPrivilegesOnFolders", args).await
    }

    pub async fn sync_users_with_directory_services(
        &self,
        instance_id: &str,
        dry_run: bool,
    ) -> Result<TaskResponse> {
        let args = instance(instance_id).flag("dryRun", dry_run);
        self.invoke("SyncUsersWithDirectoryServices", args).await
    }

    // =========================================================================
    // Instance configuration
    // =========================================================================

    pub async fn get_compliance_configuration(&self, instance_id: &str) -> Result<TaskResponse> {
        self.invoke("GetComplianceConfiguration", instance(instance_id))
            .await
    }

    pub async fn set_compliance_configuration(
        &self,
        instance_id: &str,
        config_json: &str,
    ) -> Result<TaskResponse> {
        let args = instance(instance_id).arg("config", config_json);
        self.invoke("SetComplianceConfiguration", args).await
    }

    pub async fn get_directory_services_configuration(
        &self,
        instance_id: &str,
    ) -> Result<TaskResponse> {
        self.invoke("GetDirectoryServicesConfiguration", instance(instance_id))
            .await
    }

    pub async fn set_directory_services_configuration(
        &self,
        instance_id: &str,
        config_json: &str,
    ) -> Result<TaskResponse> {
        let args = instance(instance_id).arg("config", config_json);
        self.invoke("SetDirectoryServicesConfiguration", args).await
    }

    pub async fn get_time_zones(&self, instance_id: &str) -> Result<TaskResponse> {
        self.invoke("GetTimeZones", instance(instance_id)).await
    }
}
