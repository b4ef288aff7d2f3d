/// Tag assumed when a reference does not name one.
pub const DEFAULT_TAG: &str = "latest";

/// Split an `IMAGE[:TAG]` reference into `(repository, tag)`.
///
/// The tag separator is the last `:` that is not followed by a `/`, so a
/// registry host port (`host:5000/app`) stays part of the repository name.
/// Without a tag the tag is [`DEFAULT_TAG`].
pub fn normalise_image_name(image: &str) -> (String, String) {
    match image.rsplit_once(':') {
        Some((repo, tag)) if !tag.contains('/') && !repo.is_empty() && !tag.is_empty() => {
            (repo.to_owned(), tag.to_owned())
        }
        _ => (image.to_owned(), DEFAULT_TAG.to_owned()),
    }
}
