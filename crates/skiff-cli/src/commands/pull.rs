use super::{json_pretty, open_remote, spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use skiff_core::{PullLock, Syncer};

pub fn run(syncer: &Syncer, remote_def: &str, image: &str, json: bool) -> Result<u8, String> {
    let remote = open_remote(syncer, remote_def)?;
    let id = syncer
        .resolve(remote.as_ref(), image)
        .map_err(|e| e.to_string())?;

    let _lock = PullLock::acquire_or_wait(syncer.settings(), &id, |id| {
        eprintln!("waiting for another pull of {} to finish…", id.short());
    })
    .map_err(|e| format!("pull lock: {e}"))?;

    let pb = spinner(&format!("pulling {image}…"));
    let result = syncer
        .pull_resolved(remote.as_ref(), image, &id)
        .map_err(|e| {
            spin_fail(&pb, "pull failed");
            e.to_string()
        })?;
    spin_ok(&pb, "pull complete");

    if json {
        let payload = serde_json::json!({
            "image": image,
            "id": result.id,
            "fetched": result.fetched,
            "tagged": result.tagged,
            "imported": result.transfer.sent,
            "staging": result.staging,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        if result.fetched.is_empty() {
            println!("{image} ({}) already present locally", result.id.short());
        } else {
            println!(
                "pulled {image} ({}): {} layer(s) fetched",
                result.id.short(),
                result.fetched.len()
            );
        }
        if !result.tagged {
            println!("no tag record for {image}; imported untagged");
        }
        if let Some(path) = &result.staging {
            println!("staging kept at {}", path.display());
        }
    }
    Ok(EXIT_SUCCESS)
}
