use super::{json_pretty, open_remote, spin_fail, spin_ok, spinner, styled_ref, EXIT_SUCCESS};
use skiff_core::Syncer;

pub fn run(syncer: &Syncer, remote_def: &str, image: &str, json: bool) -> Result<u8, String> {
    let remote = open_remote(syncer, remote_def)?;

    let pb = spinner(&format!("pushing {image}…"));
    let result = syncer.push(remote.as_ref(), image).map_err(|e| {
        spin_fail(&pb, "push failed");
        e.to_string()
    })?;
    spin_ok(&pb, "push complete");

    if json {
        let tags: Vec<String> = result
            .tags_written
            .iter()
            .map(|(repo, tag)| format!("{repo}:{tag}"))
            .collect();
        let payload = serde_json::json!({
            "image": image,
            "layers_pushed": result.layers_pushed,
            "layers_skipped": result.layers_skipped,
            "tags": tags,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!(
            "pushed {image} ({} layer(s); {} already on remote)",
            result.layers_pushed, result.layers_skipped
        );
        for (repo, tag) in &result.tags_written {
            println!("tagged {}", styled_ref(repo, tag));
        }
    }
    Ok(EXIT_SUCCESS)
}
