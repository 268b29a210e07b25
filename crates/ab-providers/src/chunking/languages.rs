//! Per-language grammar table
//!
//! One descriptor per supported language drives the shared AST walker: the
//! tree-sitter grammar plus the node kinds that mark callables, class-like
//! definitions, imports, and inheritance clauses. A kind listed here that a
//! grammar version does not produce simply never matches, so grammar drift
//! degrades to coarser chunks instead of failing.

use ab_domain::value_objects::Language;

/// Node-kind tables for one language
pub struct LanguageSpec {
    /// The language this spec describes
    pub language: Language,
    /// Kinds of function- and method-like definition nodes
    pub callable_kinds: &'static [&'static str],
    /// Kinds of class-like definition nodes (classes, interfaces, traits)
    pub class_kinds: &'static [&'static str],
    /// Kinds of import/include/use statements
    pub import_kinds: &'static [&'static str],
    /// Kinds of inheritance clause nodes found inside class-like nodes
    pub extends_kinds: &'static [&'static str],
}

/// Look up the spec for a language
#[must_use]
pub fn spec_for(language: Language) -> &'static LanguageSpec {
    match language {
        Language::Python => &PYTHON,
        Language::TypeScript => &TYPESCRIPT,
        Language::JavaScript => &JAVASCRIPT,
        Language::Java => &JAVA,
        Language::Kotlin => &KOTLIN,
        Language::Go => &GO,
        Language::Rust => &RUST,
        Language::C => &C,
        Language::Cpp => &CPP,
        Language::Swift => &SWIFT,
        Language::CSharp => &CSHARP,
    }
}

/// The tree-sitter grammar for a language
#[must_use]
pub fn grammar(language: Language) -> tree_sitter::Language {
    match language {
        Language::Python => tree_sitter_python::LANGUAGE.into(),
        Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        Language::Java => tree_sitter_java::LANGUAGE.into(),
        Language::Kotlin => tree_sitter_kotlin_ng::LANGUAGE.into(),
        Language::Go => tree_sitter_go::LANGUAGE.into(),
        Language::Rust => tree_sitter_rust::LANGUAGE.into(),
        Language::C => tree_sitter_c::LANGUAGE.into(),
        Language::Cpp => tree_sitter_cpp::LANGUAGE.into(),
        Language::Swift => tree_sitter_swift::LANGUAGE.into(),
        Language::CSharp => tree_sitter_c_sharp::LANGUAGE.into(),
    }
}

static PYTHON: LanguageSpec = LanguageSpec {
    language: Language::Python,
    callable_kinds: &["function_definition"],
    class_kinds: &["class_definition"],
    import_kinds: &["import_statement", "import_from_statement"],
    extends_kinds: &["argument_list"],
};

static TYPESCRIPT: LanguageSpec = LanguageSpec {
    language: Language::TypeScript,
    callable_kinds: &[
        "function_declaration",
        "generator_function_declaration",
        "method_definition",
    ],
    class_kinds: &[
        "class_declaration",
        "abstract_class_declaration",
        "interface_declaration",
        "enum_declaration",
    ],
    import_kinds: &["import_statement"],
    extends_kinds: &["class_heritage", "extends_clause"],
};

static JAVASCRIPT: LanguageSpec = LanguageSpec {
    language: Language::JavaScript,
    callable_kinds: &[
        "function_declaration",
        "generator_function_declaration",
        "method_definition",
    ],
    class_kinds: &["class_declaration"],
    import_kinds: &["import_statement"],
    extends_kinds: &["class_heritage"],
};

static JAVA: LanguageSpec = LanguageSpec {
    language: Language::Java,
    callable_kinds: &["method_declaration", "constructor_declaration"],
    class_kinds: &[
        "class_declaration",
        "interface_declaration",
        "enum_declaration",
        "record_declaration",
    ],
    import_kinds: &["import_declaration"],
    extends_kinds: &["superclass", "super_interfaces"],
};

static KOTLIN: LanguageSpec = LanguageSpec {
    language: Language::Kotlin,
    callable_kinds: &["function_declaration"],
    class_kinds: &["class_declaration", "object_declaration"],
    import_kinds: &["import_header", "import"],
    extends_kinds: &["delegation_specifier"],
};

static GO: LanguageSpec = LanguageSpec {
    language: Language::Go,
    callable_kinds: &["function_declaration", "method_declaration"],
    class_kinds: &["type_declaration"],
    import_kinds: &["import_declaration"],
    extends_kinds: &[],
};

static RUST: LanguageSpec = LanguageSpec {
    language: Language::Rust,
    callable_kinds: &["function_item"],
    class_kinds: &["struct_item", "enum_item", "trait_item", "impl_item"],
    import_kinds: &["use_declaration"],
    extends_kinds: &[],
};

static C: LanguageSpec = LanguageSpec {
    language: Language::C,
    callable_kinds: &["function_definition"],
    class_kinds: &["struct_specifier", "enum_specifier", "union_specifier"],
    import_kinds: &["preproc_include"],
    extends_kinds: &[],
};

static CPP: LanguageSpec = LanguageSpec {
    language: Language::Cpp,
    callable_kinds: &["function_definition"],
    class_kinds: &["class_specifier", "struct_specifier"],
    import_kinds: &["preproc_include"],
    extends_kinds: &["base_class_clause"],
};

static SWIFT: LanguageSpec = LanguageSpec {
    language: Language::Swift,
    callable_kinds: &["function_declaration"],
    class_kinds: &["class_declaration", "protocol_declaration"],
    import_kinds: &["import_declaration"],
    extends_kinds: &["inheritance_specifier"],
};

static CSHARP: LanguageSpec = LanguageSpec {
    language: Language::CSharp,
    callable_kinds: &["method_declaration", "constructor_declaration"],
    class_kinds: &[
        "class_declaration",
        "interface_declaration",
        "struct_declaration",
        "enum_declaration",
        "record_declaration",
    ],
    import_kinds: &["using_directive"],
    extends_kinds: &["base_list"],
};
