use serde::{Deserialize, Deserializer, Serialize};
use shared::error::{Error, Result};
use url::Url;

const SCHEME_STUN: &str = "stun";
const SCHEME_STUNS: &str = "stuns";
const SCHEME_TURN: &str = "turn";
const SCHEME_TURNS: &str = "turns";

/// RTCIceServer describes a STUN or TURN server used to gather candidates
/// that are reachable across NATs.
///
/// Both the `urls` list and the legacy single `url` form are accepted when
/// deserialized.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RTCIceServer {
    #[serde(alias = "url", deserialize_with = "one_or_many")]
    pub urls: Vec<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub credential: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(url) => vec![url],
        OneOrMany::Many(urls) => urls,
    })
}

impl RTCIceServer {
    pub fn new(url: &str) -> Self {
        RTCIceServer {
            urls: vec![url.to_owned()],
            ..Default::default()
        }
    }

    /// Checks every url is a stun(s)/turn(s) uri naming a host, and that
    /// turn servers carry credentials.
    pub fn validate(&self) -> Result<()> {
        if self.urls.is_empty() {
            return Err(Error::ErrInvalidIceServerUrl("no urls".to_owned()));
        }

        for raw in &self.urls {
            let url = Url::parse(raw)?;
            let target = match url.host_str() {
                Some(host) => host.to_owned(),
                None => url.path().to_owned(),
            };
            if target.is_empty() || target.starts_with(':') {
                return Err(Error::ErrInvalidIceServerUrl(raw.clone()));
            }

            match url.scheme() {
                SCHEME_STUN | SCHEME_STUNS => {}
                SCHEME_TURN | SCHEME_TURNS => {
                    if self.username.is_empty() || self.credential.is_empty() {
                        return Err(Error::ErrInvalidIceServerUrl(format!(
                            "{raw} requires username and credential"
                        )));
                    }
                }
                _ => return Err(Error::ErrInvalidIceServerUrl(raw.clone())),
            }
        }

        Ok(())
    }
}
