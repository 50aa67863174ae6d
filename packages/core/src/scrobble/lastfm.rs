//! Last.fm API client.
//!
//! Submits listens with `track.scrobble`. Authentication uses a mobile
//! session obtained from the username and the md5 hash of the password.
//!
//! ## API Endpoints
//!
//! - **Session**: `auth.getMobileSession` with `authToken = md5(username + password_hash)`
//! - **Scrobble**: `track.scrobble`, up to 50 indexed tracks per request
//!
//! Every call is signed: `api_sig = md5(<sorted key/value pairs><secret>)`.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;
use snafu::ResultExt;
use tracing::{debug, info};

use super::{ScrobbleEvent, Scrobbler};
use crate::config::ScrobblingConfig;
use crate::error::{Error, HttpSnafu, Result};

/// Last.fm API base URL
const LASTFM_API_BASE: &str = "https://ws.audioscrobbler.com/2.0/";

/// Timeout for API requests
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum number of tracks accepted by one `track.scrobble` call.
pub const MAX_SCROBBLE_BATCH: usize = 50;

/// Authenticated Last.fm session.
pub struct LastFmClient {
    http: reqwest::blocking::Client,
    api_key: String,
    api_secret: String,
    session_key: String,
}

impl LastFmClient {
    /// Creates a client and opens a session with the configured credentials.
    pub fn connect(config: &ScrobblingConfig) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context(HttpSnafu {
                endpoint: LASTFM_API_BASE,
            })?;

        let mut client = Self {
            http,
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            session_key: String::new(),
        };

        let params = BTreeMap::from([
            ("username".to_string(), config.username.clone()),
            (
                "authToken".to_string(),
                auth_token(&config.username, &config.password_hash),
            ),
        ]);
        let response = client.call("auth.getMobileSession", params)?;
        client.session_key = response["session"]["key"]
            .as_str()
            .ok_or_else(|| Error::scrobbler("Last.fm session response carried no key"))?
            .to_string();
        debug!("opened Last.fm session for {}", config.username);

        Ok(client)
    }

    /// Signs and POSTs one API call, returning the decoded JSON body.
    fn call(&self, method: &str, mut params: BTreeMap<String, String>) -> Result<Value> {
        params.insert("method".to_string(), method.to_string());
        params.insert("api_key".to_string(), self.api_key.clone());
        if !self.session_key.is_empty() {
            params.insert("sk".to_string(), self.session_key.clone());
        }
        let signature = api_signature(&params, &self.api_secret);
        params.insert("api_sig".to_string(), signature);
        params.insert("format".to_string(), "json".to_string());

        let response = self
            .http
            .post(LASTFM_API_BASE)
            .form(&params)
            .send()
            .context(HttpSnafu {
                endpoint: LASTFM_API_BASE,
            })?;
        let status = response.status();
        let body: Value = match response.json() {
            Ok(body) => body,
            Err(_) if !status.is_success() => {
                return Err(Error::scrobbler(format!(
                    "Last.fm {method} failed with HTTP {status}"
                )));
            }
            Err(e) => {
                return Err(e).context(HttpSnafu {
                    endpoint: LASTFM_API_BASE,
                });
            }
        };

        check_api_error(method, &body)?;
        if !status.is_success() {
            return Err(Error::scrobbler(format!(
                "Last.fm {method} failed with HTTP {status}"
            )));
        }
        Ok(body)
    }
}

impl Scrobbler for LastFmClient {
    fn submit_many(&self, events: &[ScrobbleEvent]) -> Result<()> {
        // Validate everything before the first request so a bad event
        // cannot leave the log half submitted.
        let batches = events
            .chunks(MAX_SCROBBLE_BATCH)
            .map(scrobble_params)
            .collect::<Result<Vec<_>>>()?;

        for params in batches {
            let response = self.call("track.scrobble", params)?;
            let attr = &response["scrobbles"]["@attr"];
            info!(
                "Last.fm accepted {} scrobbles, ignored {}",
                attr["accepted"], attr["ignored"]
            );
        }
        Ok(())
    }
}

/// `api_sig` for a parameter set: md5 over the key/value pairs sorted by key,
/// followed by the shared secret. `format` and `callback` are not signed.
pub fn api_signature(params: &BTreeMap<String, String>, secret: &str) -> String {
    let mut payload = String::new();
    for (key, value) in params {
        if key == "format" || key == "callback" {
            continue;
        }
        payload.push_str(key);
        payload.push_str(value);
    }
    payload.push_str(secret);
    format!("{:x}", md5::compute(payload.as_bytes()))
}

/// Mobile-session auth token: md5 of the username followed by the password hash.
pub fn auth_token(username: &str, password_hash: &str) -> String {
    format!("{:x}", md5::compute(format!("{username}{password_hash}").as_bytes()))
}

/// Indexed `track.scrobble` parameters for one batch, absent fields omitted.
pub fn scrobble_params(events: &[ScrobbleEvent]) -> Result<BTreeMap<String, String>> {
    let mut params = BTreeMap::new();
    for (i, event) in events.iter().enumerate() {
        let (Some(artist), Some(title)) = (&event.artist, &event.title) else {
            return Err(Error::scrobbler(format!(
                "cannot scrobble a track without artist and title (timestamp {})",
                event.timestamp
            )));
        };

        params.insert(format!("artist[{i}]"), artist.clone());
        params.insert(format!("track[{i}]"), title.clone());
        params.insert(format!("timestamp[{i}]"), event.timestamp.to_string());

        let optional = [
            ("album", &event.album),
            ("trackNumber", &event.track_number),
            ("duration", &event.duration),
            ("mbid", &event.mbid),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                params.insert(format!("{name}[{i}]"), value.clone());
            }
        }
    }
    Ok(params)
}

/// Turns a Last.fm `{"error": n, "message": ...}` body into an error.
fn check_api_error(method: &str, body: &Value) -> Result<()> {
    match body.get("error") {
        Some(code) => {
            let message = body["message"].as_str().unwrap_or("unknown error");
            Err(Error::scrobbler(format!(
                "Last.fm {method} failed (error {code}): {message}"
            )))
        }
        None => Ok(()),
    }
}
