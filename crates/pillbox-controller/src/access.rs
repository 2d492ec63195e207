//! Tag allow-list and scan announcements.

use std::time::Duration;

use pillbox_core::{Classification, TagId};
use pillbox_hardware::DisplayDevice;
use tracing::{info, warn};

/// Classifies tags against a static allow-list.
///
/// Anything not on the list is [`Classification::Unauthorized`].
///
/// # Examples
///
/// ```
/// use pillbox_core::{Classification, TagId};
/// use pillbox_controller::AccessController;
///
/// let access = AccessController::new(vec![TagId::new("1047839255856").unwrap()]);
///
/// assert_eq!(access.classify(&TagId::new("1047839255856").unwrap()), Classification::Authorized);
/// assert_eq!(access.classify(&TagId::new("99").unwrap()), Classification::Unauthorized);
/// ```
#[derive(Debug, Clone, Default)]
pub struct AccessController {
    allow_list: Vec<TagId>,
}

impl AccessController {
    pub fn new(allow_list: Vec<TagId>) -> Self {
        Self { allow_list }
    }

    pub fn allow_list(&self) -> &[TagId] {
        &self.allow_list
    }

    /// Look `tag` up in the allow-list.
    ///
    /// A tag matches an entry only if the whole identifier is equal. Both
    /// sides went through [`TagId::new`], which trims and upper-cases, so
    /// `a1b2` read from a reader matches an `A1B2` entry: hex UIDs have no
    /// meaningful case. Every entry is compared, so the time taken does not
    /// depend on where (or whether) the tag matched.
    pub fn classify(&self, tag: &TagId) -> Classification {
        let found = self
            .allow_list
            .iter()
            .fold(false, |found, allowed| found | (allowed == tag));

        if found {
            Classification::Authorized
        } else {
            Classification::Unauthorized
        }
    }

    /// Show the classification of a scanned tag for `duration`.
    ///
    /// A display failure is logged; the classification stands regardless.
    pub async fn announce<D: DisplayDevice>(
        &self,
        display: &mut D,
        tag: &TagId,
        classification: Classification,
        duration: Duration,
    ) {
        info!(tag = %tag, %classification, "tag scanned");

        if let Err(e) = display.show_message(classification.as_str(), duration).await {
            warn!(tag = %tag, error = %e, "failed to show scan result");
        }
    }
}
