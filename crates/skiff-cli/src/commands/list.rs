use super::{json_pretty, open_remote, styled_ref, EXIT_SUCCESS};
use skiff_core::Syncer;

pub fn run(syncer: &Syncer, remote_def: &str, json: bool) -> Result<u8, String> {
    let remote = open_remote(syncer, remote_def)?;
    let images = remote.list().map_err(|e| e.to_string())?;

    if json {
        println!("{}", json_pretty(&images)?);
        return Ok(EXIT_SUCCESS);
    }

    if images.is_empty() {
        println!("no tagged images on {}", remote.desc());
        return Ok(EXIT_SUCCESS);
    }

    let width = images
        .iter()
        .map(|i| i.repo.len() + i.tag.len() + 1)
        .max()
        .unwrap_or(0);
    for image in &images {
        let plain = image.repo.len() + image.tag.len() + 1;
        println!(
            "{}{}  {}",
            styled_ref(&image.repo, &image.tag),
            " ".repeat(width - plain),
            image.id.short()
        );
    }
    Ok(EXIT_SUCCESS)
}
