//! Sprint references embedded in an issue's rich-text sprint field
//!
//! The Target renders each sprint an issue belongs to as an opaque tag such
//! as `com.atlassian.greenhopper.service.sprint.Sprint@5c0b[name=Sprint 4,state=ACTIVE,id=12]`.
//! Only one production is read back: the leftmost `id=<digits>]`.

const SPRINT_TAG_PREFIX: &str = "com.atlassian.greenhopper.service.sprint.Sprint@trackbridge";

/// Digits of the leftmost `id=<digits>]` in `tag`
pub fn find_id(tag: &str) -> Option<&str> {
    let mut rest = tag;
    let mut offset = 0;
    while let Some(at) = rest.find("id=") {
        let start = offset + at + 3;
        let tail = &tag[start..];
        let digits = tail.bytes().take_while(u8::is_ascii_digit).count();
        if digits > 0 && tail[digits..].starts_with(']') {
            return Some(&tail[..digits]);
        }
        offset = offset + at + 1;
        rest = &tag[offset..];
    }
    None
}

/// Numeric sprint id referenced by `tag`
pub fn sprint_id(tag: &str) -> Option<i64> {
    find_id(tag).and_then(|digits| digits.parse().ok())
}

/// Render a tag that [`sprint_id`] reads back as `id`
pub fn render(id: i64, name: &str, state: &str) -> String {
    format!("{}[name={},state={},id={}]", SPRINT_TAG_PREFIX, name, state, id)
}
