/// Cleans user-supplied comment text with `ammonia`.
///
/// Safe inline tags (like <b>, <p>) survive, while <script>/<iframe> elements
/// and event-handler attributes are stripped. Surrounding whitespace is trimmed
/// so that a comment consisting only of stripped markup ends up empty.
pub fn clean_comment(input: &str) -> String {
    ammonia::clean(input).trim().to_string()
}
