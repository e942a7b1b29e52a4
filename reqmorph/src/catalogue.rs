//! Name resolution for strategies and the built-in profiles.

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::ConfigurationError;
use crate::profile::{Profile, Weighting};
use crate::strategies;
use crate::strategy::SharedStrategy;

/// Maps strategy names to instances so that profiles can be assembled from names, e.g. in
/// a configuration file.
#[derive(Clone, Default)]
pub struct Catalogue {
    strategies: BTreeMap<String, SharedStrategy>,
}

impl Catalogue {
    /// An empty catalogue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in strategy.
    pub fn builtin() -> Self {
        let mut catalogue = Self::new();
        for strategy in strategies::builtin() {
            catalogue.insert(strategy);
        }
        catalogue
    }

    /// Adds `strategy`, returning the one it replaces, if any.
    pub fn insert(&mut self, strategy: SharedStrategy) -> Option<SharedStrategy> {
        self.strategies
            .insert(strategy.name().to_owned(), strategy)
    }

    pub fn get(&self, name: &str) -> Option<&SharedStrategy> {
        self.strategies.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    /// Strategy names in lexicographic order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.strategies.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Builds a profile from `(name, enabled)` pairs, in the given order.
    pub fn profile(
        &self,
        name: &str,
        weighting: Weighting,
        entries: &[(&str, bool)],
    ) -> Result<Profile, ConfigurationError> {
        let mut profile = Profile::new(name.to_owned()).with_weighting(weighting);
        for &(strategy, enabled) in entries {
            let resolved = self.resolve(name, strategy)?;
            profile.register(resolved, enabled)?;
        }
        Ok(profile)
    }

    pub(crate) fn resolve(
        &self,
        profile: &str,
        strategy: &str,
    ) -> Result<SharedStrategy, ConfigurationError> {
        self.get(strategy)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownStrategy {
                profile: profile.to_owned(),
                name: strategy.to_owned(),
            })
    }
}

impl std::fmt::Debug for Catalogue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

/// The three profiles shipped with the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProfileKind {
    /// Broad exploration over the whole catalogue.
    General,
    /// A reduced action space for learning-driven selection.
    Reinforcement,
    /// Structural transforms that change the shape of the request.
    Deep,
}

impl ProfileKind {
    pub const ALL: [ProfileKind; 3] = [
        ProfileKind::General,
        ProfileKind::Reinforcement,
        ProfileKind::Deep,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ProfileKind::General => "general",
            ProfileKind::Reinforcement => "reinforcement",
            ProfileKind::Deep => "deep",
        }
    }

    fn entries(self) -> &'static [(&'static str, bool)] {
        match self {
            ProfileKind::General => GENERAL,
            ProfileKind::Reinforcement => REINFORCEMENT,
            ProfileKind::Deep => DEEP,
        }
    }
}

impl FromStr for ProfileKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProfileKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigurationError::UnknownProfile(s.to_owned()))
    }
}

impl std::fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Builds one of the built-in profiles from the built-in catalogue.
pub fn builtin_profile(kind: ProfileKind) -> Result<Profile, ConfigurationError> {
    Catalogue::builtin().profile(kind.name(), Weighting::Global, kind.entries())
}

/// Resolves a name written by older tooling, which stored the full function name of each
/// strategy (`mutant_methods_url_encoding`), to its catalogue name. Other names pass
/// through unchanged.
pub fn canonical_name(name: &str) -> &str {
    LEGACY_NAMES
        .iter()
        .find(|(legacy, _)| *legacy == name)
        .map_or(name, |&(_, current)| current)
}

const LEGACY_NAMES: &[(&str, &str)] = &[
    ("mutant_methods_modify_content_type_case", "content_type_value_upper"),
    ("mutant_methods_modify_content_type", "content_type_append"),
    ("mutant_methods_modify_content_type_for_rl", "content_type_append_all"),
    ("mutant_methods_fake_content_type", "content_type_fake"),
    ("mutant_methods_modify_case_of_content_type", "content_type_name_lower"),
    ("mutant_methods_add_Content_Type_for_get_request", "content_type_for_get"),
    ("mutant_methods_delete_content_type_of_data", "part_content_type_strip"),
    ("mutant_methods_change_charset", "charset_change"),
    ("mutant_methods_add_accept_charset", "accept_charset"),
    ("mutant_methods_url_encoding", "url_encoding"),
    ("mutant_methods_double_decode_obfuscation", "double_encoding"),
    ("mutant_methods_unicode_normalization", "unicode_escape"),
    ("mutant_methods_unicode_obfuscation", "unicode_obfuscation"),
    ("mutant_methods_html_obfuscation", "html_entities"),
    ("mutant_methods_line_breaks", "line_breaks"),
    ("mutant_methods_newline_obfuscation", "newline_obfuscation"),
    ("mutant_methods_tab_obfuscation", "tab_obfuscation"),
    ("mutant_methods_garbage_character_obfuscation", "garbage_obfuscation"),
    ("mutant_methods_space_obfuscation", "space_obfuscation"),
    ("mutant_methods_case_and_comment_obfuscation", "case_comment_obfuscation"),
    ("mutant_methods_upper_obfuscation", "random_case"),
    ("mutant_methods_sql_comment_obfuscation", "sql_comment"),
    ("mutant_methods_null_byte_injection", "null_byte"),
    ("mutant_methods_path_traversal", "path_traversal"),
    ("mutant_methods_add_harmless_command_for_get_request", "harmless_command"),
    ("mutant_methods_add_random_harmless_param", "harmless_param"),
    ("mutant_methods_perameter_pollution_case1", "parameter_pollution_repeat"),
    ("mutant_methods_perameter_pollution_case2", "parameter_pollution_split"),
    ("mutant_methods_multipart_boundary", "multipart_boundary"),
    ("mutant_upload_methods_double_equals", "multipart_double_equals"),
    ("mutant_methods_random_boundary_confusion", "multipart_boundary_confusion"),
    ("mutant_methods_multipart_form_data", "multipart_form_data"),
    ("mutant_methods_chunked_transfer_encoding", "chunked_encoding"),
    ("mutant_methods_add_padding", "padding"),
    ("mutant_methods_transform_SOAP", "soap_envelope"),
    ("mutant_methods_change_extensions", "extension_swap"),
    ("mutant_methods_fake_IP", "fake_ip"),
    ("mutant_methods_modify_user_agent", "user_agent"),
    ("mutant_methods_mutate_headers", "header_noise"),
    ("mutant_methods_convert_get_to_post", "get_to_post"),
    ("mutant_methods_change_request_method", "method_conversion"),
];

const GENERAL: &[(&str, bool)] = &[
    ("content_type_value_upper", true),
    ("content_type_append", true),
    ("content_type_fake", true),
    ("harmless_command", true),
    ("case_comment_obfuscation", false),
    ("url_encoding", true),
    ("unicode_escape", false),
    ("line_breaks", false),
    ("padding", true),
    ("multipart_boundary", true),
    ("multipart_double_equals", true),
    ("part_content_type_strip", true),
    ("content_type_name_lower", true),
    ("content_type_for_get", true),
    ("chunked_encoding", false),
    ("multipart_form_data", true),
    ("sql_comment", false),
    ("get_to_post", false),
    ("parameter_pollution_repeat", true),
    ("parameter_pollution_split", true),
    ("fake_ip", true),
    ("charset_change", true),
    ("accept_charset", true),
    ("extension_swap", true),
    ("soap_envelope", false),
    ("space_obfuscation", true),
    ("random_case", true),
    ("unicode_obfuscation", true),
    ("html_entities", true),
    ("double_encoding", true),
    ("newline_obfuscation", true),
    ("tab_obfuscation", true),
    ("garbage_obfuscation", true),
    ("header_noise", true),
    ("harmless_param", false),
    ("user_agent", false),
    ("null_byte", false),
    ("path_traversal", false),
    ("multipart_boundary_confusion", false),
];

const REINFORCEMENT: &[(&str, bool)] = &[
    ("content_type_fake", true),
    ("content_type_append_all", true),
    ("case_comment_obfuscation", false),
    ("url_encoding", false),
    ("unicode_escape", false),
    ("line_breaks", false),
    ("padding", true),
    ("multipart_boundary", true),
    ("multipart_double_equals", true),
    ("part_content_type_strip", false),
    ("content_type_value_upper", true),
    ("content_type_name_lower", false),
    ("content_type_for_get", false),
    ("harmless_command", true),
    ("chunked_encoding", false),
    ("multipart_form_data", false),
    ("sql_comment", false),
    ("get_to_post", false),
    ("harmless_param", false),
    ("user_agent", false),
];

const DEEP: &[(&str, bool)] = &[
    ("content_type_append", false),
    ("content_type_fake", false),
    ("case_comment_obfuscation", false),
    ("url_encoding", false),
    ("unicode_escape", false),
    ("line_breaks", false),
    ("padding", false),
    ("multipart_boundary", false),
    ("multipart_double_equals", false),
    ("part_content_type_strip", false),
    ("content_type_value_upper", false),
    ("content_type_name_lower", false),
    ("content_type_for_get", false),
    ("harmless_command", false),
    ("chunked_encoding", false),
    ("multipart_form_data", false),
    ("sql_comment", false),
    ("get_to_post", false),
    ("method_conversion", true),
    ("user_agent", false),
    ("harmless_param", false),
];

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn builtin_profiles_resolve() {
        for kind in ProfileKind::ALL {
            let profile = builtin_profile(kind).unwrap();
            assert_eq!(profile.name(), kind.name());
            assert_eq!(profile.len(), kind.entries().len());
        }
    }

    #[test]
    fn deep_profile_only_converts_methods() {
        let profile = builtin_profile(ProfileKind::Deep).unwrap();
        let active: Vec<_> = profile.active_strategies().map(|s| s.name()).collect();
        assert_eq!(active, vec!["method_conversion"]);
    }

    #[test]
    fn general_profile_keeps_declaration_order() {
        let profile = builtin_profile(ProfileKind::General).unwrap();
        let first: Vec<_> = profile
            .active_strategies()
            .take(3)
            .map(|s| s.name())
            .collect();
        assert_eq!(
            first,
            vec!["content_type_value_upper", "content_type_append", "content_type_fake"]
        );
    }

    #[test]
    fn unknown_names_are_configuration_errors() {
        let catalogue = Catalogue::builtin();
        assert_matches!(
            catalogue.profile("custom", Weighting::Global, &[("nope", true)]),
            Err(ConfigurationError::UnknownStrategy { name, .. }) if name == "nope"
        );
        assert_matches!(
            catalogue.profile("custom", Weighting::Global, &[("padding", true), ("padding", false)]),
            Err(ConfigurationError::DuplicateStrategy { .. })
        );
        assert_matches!(
            "turbo".parse::<ProfileKind>(),
            Err(ConfigurationError::UnknownProfile(_))
        );
        assert_eq!("Deep".parse::<ProfileKind>().unwrap(), ProfileKind::Deep);
    }

    #[test]
    fn catalogue_holds_every_builtin() {
        let catalogue = Catalogue::builtin();
        assert_eq!(catalogue.len(), strategies::BUILTIN.len());
        assert!(catalogue.contains("multipart_boundary"));
    }

    #[test]
    fn legacy_names_resolve_to_builtins() {
        let catalogue = Catalogue::builtin();
        for &(legacy, current) in LEGACY_NAMES {
            assert!(catalogue.contains(current), "{legacy} maps to unknown {current}");
            assert_eq!(canonical_name(legacy), current);
        }
        assert_eq!(canonical_name("mutant_methods_url_encoding"), "url_encoding");
        assert_eq!(canonical_name("url_encoding"), "url_encoding");
        assert_eq!(canonical_name("custom"), "custom");
    }
}
