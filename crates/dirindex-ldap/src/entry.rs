//! Directory entity view
//!
//! An immutable snapshot of one search result: its DN, a derived common
//! name, and a single value per attribute. Binary attribute values are
//! carried as base64 text. Rendering through a display template produces
//! HTML-escaped document body text.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ldap3::SearchEntry;
use tracing::trace;

use dirindex_core::error::{CrawlError, CrawlResult};

/// One directory entity, built from a single search result.
#[derive(Debug, Clone)]
pub struct DirectoryEntity {
    dn: String,
    common_name: String,
    // Sorted by attribute name. A None value means the attribute was
    // present on the entry but carried no value.
    attributes: BTreeMap<String, Option<String>>,
}

impl DirectoryEntity {
    /// Build an entity from a raw search result.
    ///
    /// Fails when the result carries no DN. Only the first value of a
    /// multi-valued attribute is kept; binary values are base64-encoded.
    pub fn from_search_entry(entry: SearchEntry) -> CrawlResult<Self> {
        if entry.dn.is_empty() {
            return Err(CrawlError::malformed_record(
                "search result has no distinguished name",
            ));
        }

        let mut attributes = BTreeMap::new();
        for (name, values) in entry.attrs {
            attributes.insert(name, values.into_iter().next());
        }
        for (name, values) in entry.bin_attrs {
            let encoded = values.first().map(|v| BASE64.encode(v));
            attributes.entry(name).or_insert(encoded);
        }

        let common_name = extract_common_name(&entry.dn);
        Ok(Self {
            dn: entry.dn,
            common_name,
            attributes,
        })
    }

    /// Distinguished name of this entity.
    #[must_use]
    pub fn dn(&self) -> &str {
        &self.dn
    }

    /// Common name derived from the DN's first component.
    #[must_use]
    pub fn common_name(&self) -> &str {
        &self.common_name
    }

    /// Look up the value of an attribute, matching the name case
    /// insensitively. Returns None when the attribute is absent or
    /// carries no value.
    #[must_use]
    pub fn attribute_value(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(attr, _)| attr.eq_ignore_ascii_case(name))
            .and_then(|(_, value)| value.as_deref())
    }

    /// Names of every attribute present on this entity.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// All attributes as document metadata. Attributes present without a
    /// value show up as the literal string "null".
    #[must_use]
    pub fn as_metadata(&self) -> BTreeMap<String, String> {
        self.attributes
            .iter()
            .map(|(name, value)| {
                let value = value.clone().unwrap_or_else(|| "null".to_string());
                (name.clone(), value)
            })
            .collect()
    }

    /// Render this entity through a display template.
    ///
    /// Each `{attr}` placeholder is replaced by the attribute's value, or
    /// by nothing when the attribute is absent. The result is HTML-escaped,
    /// except that literal `<br>` sequences survive as line breaks.
    ///
    /// Templates are validated at startup, so an unterminated placeholder
    /// here means the template bypassed validation.
    pub fn render_document(&self, template: &str) -> CrawlResult<String> {
        let mut rendered = String::with_capacity(template.len());
        let mut chars = template.chars();
        while let Some(c) = chars.next() {
            if c != '{' {
                rendered.push(c);
                continue;
            }
            let mut name = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                name.push(c);
            }
            if !closed {
                return Err(CrawlError::invalid_configuration(format!(
                    "invalid display template: {template}. \
                     No close brace matches open brace"
                )));
            }
            match self.attribute_value(&name) {
                Some(value) => rendered.push_str(value),
                None => trace!(dn = %self.dn, attribute = %name, "placeholder has no value"),
            }
        }
        Ok(unescape_breaks(&escape_html(&rendered)))
    }
}

/// Pull the common name out of a DN: the value of the first component,
/// up to the first unescaped comma, with escape backslashes removed.
fn extract_common_name(dn: &str) -> String {
    let bytes = dn.as_bytes();
    let mut end = dn.len();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b',' && i > 0 && bytes[i - 1] != b'\\' {
            end = i;
            break;
        }
    }
    let component = &dn[..end];
    let value = match component.find('=') {
        Some(eq) => &component[eq + 1..],
        None => component,
    };
    value.replace('\\', "")
}

/// Escape text for inclusion in an HTML document body. Every codepoint
/// above 127 and the characters `<`, `>`, `&` become decimal character
/// references.
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if (c as u32) > 127 || c == '<' || c == '>' || c == '&' {
            escaped.push_str(&format!("&#{};", c as u32));
        } else {
            escaped.push(c);
        }
    }
    escaped
}

/// Restore literal `<br>` sequences that escaping turned into character
/// references, so templates can force line breaks.
fn unescape_breaks(text: &str) -> String {
    text.replace("&#60;br&#62;", "<br>")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity_with(dn: &str, attrs: &[(&str, &[&str])]) -> DirectoryEntity {
        let mut entry = SearchEntry {
            dn: dn.to_string(),
            attrs: Default::default(),
            bin_attrs: Default::default(),
        };
        for (name, values) in attrs {
            entry.attrs.insert(
                name.to_string(),
                values.iter().map(|v| v.to_string()).collect(),
            );
        }
        DirectoryEntity::from_search_entry(entry).unwrap()
    }

    fn sample_entity() -> DirectoryEntity {
        entity_with(
            "cn=user,ou=Users,dc=example,dc=com",
            &[
                ("cn", &["user"]),
                ("givenName", &["Test"]),
                ("sn", &["User"]),
            ],
        )
    }

    #[test]
    fn test_dn_and_common_name() {
        let entity = sample_entity();
        assert_eq!(entity.dn(), "cn=user,ou=Users,dc=example,dc=com");
        assert_eq!(entity.common_name(), "user");
    }

    #[test]
    fn test_common_name_with_escaped_commas() {
        let entity = entity_with(
            "cn=name\\,with\\,commas,ou=Users,dc=example,dc=com",
            &[("cn", &["name\\,with\\,commas"])],
        );
        assert_eq!(entity.common_name(), "name,with,commas");
    }

    #[test]
    fn test_common_name_with_no_comma() {
        let entity = entity_with("dc=com", &[("cn", &["com"])]);
        assert_eq!(entity.common_name(), "com");
    }

    #[test]
    fn test_common_name_with_trailing_comma() {
        let entity = entity_with("dc=com,", &[("cn", &["com"])]);
        assert_eq!(entity.dn(), "dc=com,");
        assert_eq!(entity.common_name(), "com");
    }

    #[test]
    fn test_common_name_without_equals() {
        let entity = entity_with("just-a-name", &[]);
        assert_eq!(entity.common_name(), "just-a-name");
    }

    #[test]
    fn test_common_name_leading_comma_not_a_separator() {
        // A comma at index 0 cannot end the first component.
        assert_eq!(extract_common_name(",cn=x"), ",cn=x");
    }

    #[test]
    fn test_empty_dn_rejected() {
        let entry = SearchEntry {
            dn: String::new(),
            attrs: Default::default(),
            bin_attrs: Default::default(),
        };
        assert!(matches!(
            DirectoryEntity::from_search_entry(entry),
            Err(CrawlError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_attribute_lookup_is_case_insensitive() {
        let entity = sample_entity();
        assert_eq!(entity.attribute_value("givenname"), Some("Test"));
        assert_eq!(entity.attribute_value("GIVENNAME"), Some("Test"));
        assert_eq!(entity.attribute_value("missing"), None);
    }

    #[test]
    fn test_multi_valued_attribute_keeps_first() {
        let entity = entity_with("cn=x", &[("mail", &["a@example.com", "b@example.com"])]);
        assert_eq!(entity.attribute_value("mail"), Some("a@example.com"));
    }

    #[test]
    fn test_binary_attribute_is_base64() {
        let mut entry = SearchEntry {
            dn: "cn=x".to_string(),
            attrs: Default::default(),
            bin_attrs: Default::default(),
        };
        entry
            .bin_attrs
            .insert("objectGUID".to_string(), vec![vec![0x01, 0x02, 0xff]]);
        let entity = DirectoryEntity::from_search_entry(entry).unwrap();
        assert_eq!(entity.attribute_value("objectGUID"), Some("AQL/"));
    }

    #[test]
    fn test_valueless_attribute_in_metadata() {
        let entity = entity_with("cn=x", &[("cn", &["x"]), ("name", &[])]);
        assert_eq!(entity.attribute_value("name"), None);
        let metadata = entity.as_metadata();
        assert_eq!(metadata["name"], "null");
        assert_eq!(metadata["cn"], "x");
    }

    #[test]
    fn test_render_substitutes_placeholders() {
        let entity = sample_entity();
        assert_eq!(
            entity.render_document("Name: {givenName} {sn}").unwrap(),
            "Name: Test User"
        );
    }

    #[test]
    fn test_render_missing_attribute_is_empty() {
        let entity = sample_entity();
        assert_eq!(entity.render_document("Name: {missing}").unwrap(), "Name: ");
        assert_eq!(entity.render_document("{missing}").unwrap(), "");
    }

    #[test]
    fn test_render_default_template() {
        let entity = sample_entity();
        let template = crate::config::default_display_template("cn,givenName,sn");
        assert_eq!(
            entity.render_document(&template).unwrap(),
            "cn: user<br>givenName: Test<br>sn: User<br>"
        );
    }

    #[test]
    fn test_render_unterminated_placeholder_is_error() {
        let entity = sample_entity();
        assert!(matches!(
            entity.render_document("{missing"),
            Err(CrawlError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_render_escapes_html() {
        let entity = sample_entity();
        assert_eq!(
            entity.render_document("<\"&'\u{92}>").unwrap(),
            "&#60;\"&#38;'&#146;&#62;"
        );
    }

    #[test]
    fn test_render_escapes_attribute_values() {
        let entity = entity_with("cn=x", &[("cn", &["a<b>&c"])]);
        assert_eq!(
            entity.render_document("{cn}").unwrap(),
            "a&#60;b&#62;&#38;c"
        );
    }

    #[test]
    fn test_render_keeps_literal_breaks() {
        let entity = sample_entity();
        assert_eq!(entity.render_document("a<br>b").unwrap(), "a<br>b");
    }

    #[test]
    fn test_render_escapes_high_codepoints() {
        let entity = entity_with("cn=x", &[("cn", &["Zoë"])]);
        assert_eq!(entity.render_document("{cn}").unwrap(), "Zo&#235;");
    }
}
