//! Typed request and response structures of the remote service API.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::types::ExternalId;

/// Field selection for package queries
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageQuery {
    /// Include the total byte size
    pub bytes_total: bool,
    /// Include the save path
    pub save_to: bool,
    /// Include the number of online links
    pub available_online_count: bool,
    /// Include the number of temporarily unknown links
    pub available_temp_unknown_count: bool,
    /// Include the number of unknown links
    pub available_unknown_count: bool,
}

impl PackageQuery {
    /// Ids and save paths
    pub fn save_paths() -> Self {
        Self {
            save_to: true,
            ..Self::default()
        }
    }

    /// Everything the collection poller needs
    pub fn collection() -> Self {
        Self {
            bytes_total: true,
            save_to: true,
            available_online_count: true,
            available_temp_unknown_count: true,
            available_unknown_count: true,
        }
    }
}

/// A package in the pending (linkgrabber) list
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingPackage {
    /// Package id
    pub uuid: ExternalId,
    /// Package name
    #[serde(default)]
    pub name: String,
    /// Directory the package will be saved to
    pub save_to: PathBuf,
    /// Total size of all links in bytes
    #[serde(default)]
    pub bytes_total: u64,
    /// Links confirmed online; absent means the service did not check yet
    #[serde(default = "default_online_count")]
    pub online_count: u32,
    /// Links whose availability is temporarily unknown
    #[serde(default)]
    pub temp_unknown_count: u32,
    /// Links whose availability is unknown
    #[serde(default)]
    pub unknown_count: u32,
}

impl PendingPackage {
    /// True when no link of the package is online
    pub fn is_corrupted(&self) -> bool {
        self.online_count == 0
    }

    /// True when some links still need an availability check
    pub fn has_unknown_links(&self) -> bool {
        self.temp_unknown_count > 0 || self.unknown_count > 0
    }
}

fn default_online_count() -> u32 {
    1
}

/// A package in the active download list
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivePackage {
    /// Package id (differs from the pending-list id)
    pub uuid: ExternalId,
    /// Directory the package is saved to
    pub save_to: PathBuf,
}

impl ActivePackage {
    /// Whether the package is saved under `dir`
    pub fn is_under(&self, dir: &Path) -> bool {
        self.save_to.starts_with(dir)
    }
}

/// Link query over pending packages
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkQuery {
    /// Restrict to links of these packages
    #[serde(rename = "packageUUIDs")]
    pub package_uuids: Vec<ExternalId>,
    /// Include the availability of each link
    pub availability: bool,
}

/// A single link in the pending list
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingLink {
    /// Link id
    pub uuid: ExternalId,
    /// Availability as reported by the service ("ONLINE", "OFFLINE", "UNKNOWN", ...)
    #[serde(default)]
    pub availability: String,
}

impl PendingLink {
    /// Only an exact "online" availability counts
    pub fn is_online(&self) -> bool {
        self.availability.eq_ignore_ascii_case("online")
    }
}

/// Request to add plain links to the pending list
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLinksRequest {
    /// Extract archives after download
    pub auto_extract: bool,
    /// Newline-separated links
    pub links: String,
    /// Name of the package to create
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,
}

impl AddLinksRequest {
    /// Links with extraction disabled, named after the job when it has a name
    pub fn new(links: &[String], package_name: &str) -> Self {
        Self {
            auto_extract: false,
            links: links.join("\n"),
            package_name: (!package_name.is_empty()).then(|| package_name.to_string()),
        }
    }
}

/// Removal of pending links and/or whole pending packages
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemovalRequest {
    /// Individual links to remove
    pub link_ids: Vec<ExternalId>,
    /// Whole packages to remove
    pub package_ids: Vec<ExternalId>,
}

impl RemovalRequest {
    /// Remove whole packages
    pub fn packages(package_ids: impl IntoIterator<Item = ExternalId>) -> Self {
        Self {
            link_ids: Vec::new(),
            package_ids: package_ids.into_iter().collect(),
        }
    }

    /// True when there is nothing to remove
    pub fn is_empty(&self) -> bool {
        self.link_ids.is_empty() && self.package_ids.is_empty()
    }
}
