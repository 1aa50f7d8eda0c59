use conftree::XmlNode;
use thiserror::Error;
use uuid::Uuid;

/// Errors from parsing or serializing the appliance configuration document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("malformed appliance configuration: {0}")]
    Malformed(#[from] conftree::ParseError),
    #[error("failed to serialize appliance configuration: {0}")]
    Serialize(#[from] conftree::WriteError),
}

/// In-memory model of the appliance's whole configuration document.
///
/// The document is externally owned and mostly opaque; only two regions are
/// addressed here: the MAC alias under `OPNsense/Firewall/Alias/aliases`
/// and the block rule under `filter`. A document instance lives for one
/// reconciliation pass: fetched, patched, serialized, discarded.
#[derive(Debug, Clone)]
pub struct ConfigDocument {
    root: XmlNode,
}

impl ConfigDocument {
    /// Parse fetched configuration bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self, DocumentError> {
        Ok(Self {
            root: conftree::parse(bytes)?,
        })
    }

    /// Serialize the document for pushing back to the appliance.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocumentError> {
        Ok(conftree::write(&self.root)?)
    }

    pub fn root(&self) -> &XmlNode {
        &self.root
    }

    /// First alias under `OPNsense/Firewall/Alias/aliases` with the given
    /// name. Names are compared case-insensitively, matching how the
    /// appliance treats alias identifiers.
    pub fn find_alias(&self, name: &str) -> Option<&XmlNode> {
        let aliases = self
            .root
            .get_child("OPNsense")?
            .get_child("Firewall")?
            .get_child("Alias")?
            .get_child("aliases")?;
        aliases
            .get_children("alias")
            .into_iter()
            .find(|alias| alias_name_matches(alias, name))
    }

    /// Create or rewrite the MAC alias in place.
    ///
    /// An existing alias keeps its `uuid` attribute and document position;
    /// its children are cleared and rewritten. A missing alias is created
    /// under the nested section path, creating intermediate sections as
    /// needed (a freshly created `Alias` section is seeded with a schema
    /// `version`). Idempotent: running twice with the same inputs leaves the
    /// subtree unchanged.
    pub fn upsert_alias(&mut self, name: &str, content: &str, description: &str) {
        let firewall = self.root.ensure_path(&["OPNsense", "Firewall"]);
        let seeding = firewall.get_child("Alias").is_none();
        let alias_section = firewall.ensure_child("Alias");
        if seeding {
            alias_section
                .children
                .push(XmlNode::with_text("version", "1.0.1"));
        }
        let aliases = alias_section.ensure_child("aliases");

        let fields = alias_fields(name, content, description);
        match aliases
            .children
            .iter_mut()
            .find(|c| c.tag == "alias" && alias_name_matches(c, name))
        {
            Some(existing) => existing.replace_children(fields),
            None => {
                let alias = aliases.push_child(XmlNode::new("alias"));
                alias
                    .attributes
                    .insert("uuid".to_string(), Uuid::new_v4().to_string());
                alias.replace_children(fields);
            }
        }
    }

    /// First filter rule carrying the marker token.
    ///
    /// The marker is a synthetic token embedded in the rule description and
    /// compared against whitespace-split description words for exact
    /// equality, not as a substring, so a human-edited description cannot
    /// collide by accident. An unrelated rule whose description contains the
    /// literal token would still match first.
    pub fn find_rule(&self, marker: &str) -> Option<&XmlNode> {
        let filter = self.root.get_child("filter")?;
        filter
            .get_children("rule")
            .into_iter()
            .find(|rule| rule_has_marker(rule, marker))
    }

    /// Create or rewrite the block rule that references the MAC alias.
    ///
    /// Fixed semantics: block, LAN inbound, both address families, quick
    /// (stop evaluating further rules), source = the alias, destination =
    /// any. `enabled` is stored as the negation of the `disabled` flag.
    pub fn upsert_block_rule(&mut self, alias_name: &str, marker: &str, label: &str, enabled: bool) {
        let filter = self.root.ensure_child("filter");
        let fields = block_rule_fields(alias_name, marker, label, enabled);

        match filter
            .children
            .iter_mut()
            .find(|c| c.tag == "rule" && rule_has_marker(c, marker))
        {
            Some(existing) => existing.replace_children(fields),
            None => {
                let rule = filter.push_child(XmlNode::new("rule"));
                rule.attributes
                    .insert("uuid".to_string(), Uuid::new_v4().to_string());
                rule.replace_children(fields);
            }
        }
    }

    /// Flip only the `disabled` flag on the marked rule, leaving every other
    /// field untouched. Returns false if no marked rule exists.
    pub fn set_rule_enabled(&mut self, marker: &str, enabled: bool) -> bool {
        let Some(filter) = self.root.get_child_mut("filter") else {
            return false;
        };
        let Some(rule) = filter
            .children
            .iter_mut()
            .find(|c| c.tag == "rule" && rule_has_marker(c, marker))
        else {
            return false;
        };
        rule.set_child_text("disabled", if enabled { "0" } else { "1" });
        true
    }

    /// Whether the marked rule exists and is not disabled. A rule without a
    /// `disabled` child counts as enabled.
    pub fn rule_enabled(&self, marker: &str) -> Option<bool> {
        let rule = self.find_rule(marker)?;
        Some(rule.get_text(&["disabled"]) != Some("1"))
    }
}

fn alias_name_matches(alias: &XmlNode, name: &str) -> bool {
    alias
        .get_text(&["name"])
        .is_some_and(|n| n.trim().eq_ignore_ascii_case(name))
}

fn rule_has_marker(rule: &XmlNode, marker: &str) -> bool {
    rule.get_text(&["descr"])
        .is_some_and(|descr| descr.split_whitespace().any(|token| token == marker))
}

fn alias_fields(name: &str, content: &str, description: &str) -> Vec<XmlNode> {
    vec![
        XmlNode::with_text("enabled", "1"),
        XmlNode::with_text("name", name),
        XmlNode::with_text("type", "mac"),
        XmlNode::new("path_expression"),
        XmlNode::new("proto"),
        XmlNode::new("interface"),
        XmlNode::with_text("counters", "0"),
        XmlNode::new("updatefreq"),
        XmlNode::with_text("content", content),
        XmlNode::with_text("description", description),
    ]
}

fn block_rule_fields(alias_name: &str, marker: &str, label: &str, enabled: bool) -> Vec<XmlNode> {
    let mut source = XmlNode::new("source");
    source.children.push(XmlNode::with_text("address", alias_name));
    let mut destination = XmlNode::new("destination");
    destination.children.push(XmlNode::with_text("any", "1"));

    vec![
        XmlNode::with_text("type", "block"),
        XmlNode::with_text("interface", "lan"),
        XmlNode::with_text("ipprotocol", "inet46"),
        XmlNode::with_text("statetype", "keep state"),
        XmlNode::with_text("direction", "in"),
        XmlNode::with_text("quick", "1"),
        XmlNode::with_text("disabled", if enabled { "0" } else { "1" }),
        source,
        destination,
        XmlNode::with_text(
            "descr",
            format!("{label} {marker} blocks devices in the {alias_name} alias"),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::ConfigDocument;

    const MARKER: &str = "[macguard:block]";

    fn doc(xml: &[u8]) -> ConfigDocument {
        ConfigDocument::parse(xml).expect("parse")
    }

    fn empty_doc() -> ConfigDocument {
        doc(br#"<opnsense><system><hostname>router</hostname></system></opnsense>"#)
    }

    #[test]
    fn upsert_alias_creates_nested_sections() {
        let mut document = empty_doc();
        document.upsert_alias("ParentalControlMACs", "AA:BB:CC:DD:EE:01", "2 devices");

        let alias = document.find_alias("ParentalControlMACs").expect("alias");
        assert_eq!(alias.get_text(&["type"]), Some("mac"));
        assert_eq!(alias.get_text(&["enabled"]), Some("1"));
        assert_eq!(alias.get_text(&["content"]), Some("AA:BB:CC:DD:EE:01"));
        assert!(alias.attributes.contains_key("uuid"));

        // Freshly created Alias section carries a schema version.
        assert_eq!(
            document
                .root()
                .get_text(&["OPNsense", "Firewall", "Alias", "version"]),
            Some("1.0.1")
        );
    }

    #[test]
    fn upsert_alias_rewrites_in_place_preserving_uuid() {
        let mut document = doc(
            br#"<opnsense><OPNsense><Firewall><Alias><version>1.0.1</version><aliases><alias uuid="keep-me"><enabled>1</enabled><name>ParentalControlMACs</name><type>mac</type><content>AA:BB:CC:DD:EE:99</content><description>old</description></alias></aliases></Alias></Firewall></OPNsense></opnsense>"#,
        );

        document.upsert_alias(
            "ParentalControlMACs",
            "AA:BB:CC:DD:EE:01\nAA:BB:CC:DD:EE:02",
            "2 devices",
        );

        let alias = document.find_alias("ParentalControlMACs").expect("alias");
        assert_eq!(
            alias.attributes.get("uuid").map(String::as_str),
            Some("keep-me")
        );
        assert_eq!(
            alias.get_text(&["content"]),
            Some("AA:BB:CC:DD:EE:01\nAA:BB:CC:DD:EE:02")
        );
        assert_eq!(alias.get_text(&["description"]), Some("2 devices"));
    }

    #[test]
    fn upsert_alias_twice_is_byte_identical() {
        let mut document = empty_doc();
        document.upsert_alias("ParentalControlMACs", "AA:BB:CC:DD:EE:01", "1 devices");
        let first = document.to_bytes().expect("serialize");

        document.upsert_alias("ParentalControlMACs", "AA:BB:CC:DD:EE:01", "1 devices");
        let second = document.to_bytes().expect("serialize");

        assert_eq!(first, second);
    }

    #[test]
    fn alias_names_match_case_insensitively() {
        let mut document = empty_doc();
        document.upsert_alias("ParentalControlMACs", "AA:BB:CC:DD:EE:01", "1 devices");
        document.upsert_alias("parentalcontrolmacs", "AA:BB:CC:DD:EE:02", "1 devices");

        let aliases = document
            .root()
            .get_child("OPNsense")
            .and_then(|n| n.get_child("Firewall"))
            .and_then(|n| n.get_child("Alias"))
            .and_then(|n| n.get_child("aliases"))
            .expect("aliases");
        assert_eq!(aliases.get_children("alias").len(), 1);
    }

    #[test]
    fn upsert_block_rule_creates_disabled_rule_with_fixed_semantics() {
        let mut document = empty_doc();
        document.upsert_block_rule("ParentalControlMACs", MARKER, "ParentalControlBlock", false);

        let rule = document.find_rule(MARKER).expect("rule");
        assert_eq!(rule.get_text(&["type"]), Some("block"));
        assert_eq!(rule.get_text(&["interface"]), Some("lan"));
        assert_eq!(rule.get_text(&["ipprotocol"]), Some("inet46"));
        assert_eq!(rule.get_text(&["direction"]), Some("in"));
        assert_eq!(rule.get_text(&["quick"]), Some("1"));
        assert_eq!(rule.get_text(&["disabled"]), Some("1"));
        assert_eq!(
            rule.get_text(&["source", "address"]),
            Some("ParentalControlMACs")
        );
        assert_eq!(rule.get_text(&["destination", "any"]), Some("1"));
    }

    #[test]
    fn marker_matches_exact_token_not_substring() {
        let document = doc(
            br#"<opnsense><filter><rule><descr>user wrote [macguard:block]ish here</descr></rule><rule><descr>real [macguard:block] rule</descr></rule></filter></opnsense>"#,
        );

        let rule = document.find_rule(MARKER).expect("rule");
        assert_eq!(rule.get_text(&["descr"]), Some("real [macguard:block] rule"));
    }

    #[test]
    fn set_rule_enabled_flips_only_the_disabled_flag() {
        let mut document = empty_doc();
        document.upsert_block_rule("ParentalControlMACs", MARKER, "ParentalControlBlock", false);
        let before = document.find_rule(MARKER).expect("rule").clone();

        assert!(document.set_rule_enabled(MARKER, true));

        let after = document.find_rule(MARKER).expect("rule");
        assert_eq!(after.get_text(&["disabled"]), Some("0"));
        assert_eq!(document.rule_enabled(MARKER), Some(true));

        let mut after_reverted = after.clone();
        after_reverted.set_child_text("disabled", "1");
        assert_eq!(after_reverted, before, "no other field changed");
    }

    #[test]
    fn set_rule_enabled_without_rule_reports_false() {
        let mut document = empty_doc();
        assert!(!document.set_rule_enabled(MARKER, true));
    }

    #[test]
    fn rule_without_disabled_child_counts_as_enabled() {
        let document = doc(
            br#"<opnsense><filter><rule><descr>x [macguard:block] y</descr></rule></filter></opnsense>"#,
        );
        assert_eq!(document.rule_enabled(MARKER), Some(true));
    }

    #[test]
    fn untouched_sections_survive_a_patch() {
        let mut document = doc(
            br#"<opnsense><system><hostname>router</hostname></system><interfaces><lan><if>igb0</if></lan></interfaces></opnsense>"#,
        );
        document.upsert_alias("ParentalControlMACs", "AA:BB:CC:DD:EE:01", "1 devices");

        assert_eq!(
            document.root().get_text(&["system", "hostname"]),
            Some("router")
        );
        assert_eq!(
            document.root().get_text(&["interfaces", "lan", "if"]),
            Some("igb0")
        );
    }
}
