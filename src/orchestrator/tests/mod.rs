use super::test_helpers::*;
use super::*;
use crate::admission::DuplicateRejection;
use crate::error::{NOT_ADDED_MESSAGE, REMOVED_MANUALLY_MESSAGE, UserAction};
use crate::job::{JobSource, SameDirGroup, UserId};
use crate::remote::{PackageQuery, PendingLink};
use crate::selection::SelectionAction;
use crate::types::{ExternalId, Stage};
use std::path::Path;
use std::time::Duration;
