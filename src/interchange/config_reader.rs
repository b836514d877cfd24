use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};
use snafu::ensure;

use result_import::{ImportChannel, ImportSettings};

use crate::interchange::io_common::read_document;
use crate::interchange::*;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelSettings {
    /// canton -> external ids of the test counting circles
    #[serde(rename = "testCountingCircles")]
    pub test_counting_circles: Option<BTreeMap<String, Vec<String>>>,
}

/// The settings document of the import engine.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct ImportSettingsConfig {
    #[serde(rename = "eVoting")]
    pub e_voting: Option<ChannelSettings>,
    #[serde(rename = "eCounting")]
    pub e_counting: Option<ChannelSettings>,
}

pub fn read_settings(path: &str) -> InterchangeResult<ImportSettings> {
    let config: ImportSettingsConfig = read_document(path)?;
    validate_settings(&config)
}

pub fn validate_settings(config: &ImportSettingsConfig) -> InterchangeResult<ImportSettings> {
    let mut settings = ImportSettings::default();
    let channels = [
        (ImportChannel::EVoting, &config.e_voting),
        (ImportChannel::ECounting, &config.e_counting),
    ];
    for (channel, channel_settings) in channels {
        let by_canton = channel_settings
            .as_ref()
            .and_then(|c| c.test_counting_circles.as_ref());
        for (canton, ids) in by_canton.into_iter().flatten() {
            ensure!(
                !canton.trim().is_empty(),
                InvalidDocumentSnafu {
                    document: "settings",
                    message: format!("empty canton for the {} test counting circles", channel),
                }
            );
            for id in ids.iter() {
                ensure!(
                    !id.trim().is_empty(),
                    InvalidDocumentSnafu {
                        document: "settings",
                        message: format!(
                            "empty test counting circle id for {} / {}",
                            channel, canton
                        ),
                    }
                );
                settings = settings.with_test_counting_circle(channel, canton, id.trim());
            }
        }
    }
    debug!("validate_settings: {:?}", settings);
    Ok(settings)
}
