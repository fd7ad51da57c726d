//! Default prototype record for the indexed store
//!
//! Mirrors the payload the telemetry client posts to `/v1/on_import`, plus
//! the `server_time` stamped on ingest. Only the shape matters; the values
//! are placeholders.

use serde_json::{json, Value};

/// The standard client payload shape
pub fn default_prototype() -> Value {
    json!({
        "username": "",
        "uuid": "",
        "hostname": "",
        "hostfqdn": "",
        "uname": ["", "", "", "", "", ""],
        "python": {
            "argv": "",
            "bin": "",
            "is_64bit": true,
            "version": "",
            "version_full": "",
            "compiler": "",
            "build_date": "",
            "version_info": [0, 0, 0, "", 0],
            "have_ucs4": true,
            "have_readline": true
        },
        "time": {
            "utc_epoch": "",
            "std_utc_offset": 0.0
        },
        "server_time": ""
    })
}
