use super::{json_pretty, open_remote, EXIT_SUCCESS};
use skiff_core::Syncer;

pub fn run(syncer: &Syncer, remote_def: &str, json: bool) -> Result<u8, String> {
    let remote = open_remote(syncer, remote_def)?;
    let desc = remote.desc();
    remote
        .validate()
        .map_err(|e| format!("{desc} is not usable: {e}"))?;

    if json {
        let payload = serde_json::json!({
            "remote": desc,
            "ok": true,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("✓ {desc} is usable");
    }
    Ok(EXIT_SUCCESS)
}
