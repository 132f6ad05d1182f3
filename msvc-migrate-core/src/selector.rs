//! Path expressions that select elements of a [`Document`]
//!
//! The grammar is the subset of XPath the migration rules need:
//!
//! ```text
//! selector  := ( "/" | "//" ) step { ( "/" | "//" ) step }
//! step      := name-test { predicate }
//! name-test := "*" | [ prefix ":" ] local-name
//! predicate := "[" "@" attribute [ "=" literal ] "]"
//!            | "[" "not(@" attribute ")" "]"
//!            | "[" name-test "=" literal "]"
//! literal   := "'" ... "'" | '"' ... '"'
//! ```
//!
//! Unprefixed names resolve through the default namespace binding, so with
//! the MSBuild namespace bound both as default and as `ms`, `Project` and
//! `ms:Project` select the same elements.

use std::{
    collections::BTreeMap,
    fmt,
};

use crate::{
    document::{
        Document,
        Element,
        Node,
        NodePath,
    },
    error::{
        MigrateError,
        MigrateResult,
    },
};

/// Prefix bindings used to resolve names in selectors
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespaces {
    default:  Option<String>,
    prefixes: BTreeMap<String, String>,
}

impl Namespaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `uri` as the namespace of unprefixed names
    pub fn with_default(mut self, uri: impl Into<String>) -> Self {
        self.default = Some(uri.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.prefixes.insert(prefix.into(), uri.into());
        self
    }

    fn resolve(&self, prefix: Option<&str>) -> Option<Option<String>> {
        match prefix {
            None => Some(self.default.clone()),
            Some(prefix) => self.prefixes.get(prefix).map(|uri| Some(uri.clone())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NameTest {
    Any,
    Name {
        namespace: Option<String>,
        local:     String,
    },
}

impl NameTest {
    fn matches(&self, element: &Element) -> bool {
        match self {
            NameTest::Any => true,
            NameTest::Name { namespace, local } => {
                element.namespace() == namespace.as_deref() && element.local_name() == *local
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    HasAttribute(String),
    LacksAttribute(String),
    AttributeEquals(String, String),
    ChildTextEquals(NameTest, String),
}

impl Predicate {
    fn matches(&self, element: &Element) -> bool {
        match self {
            Predicate::HasAttribute(key) => element.attribute(key).is_some(),
            Predicate::LacksAttribute(key) => element.attribute(key).is_none(),
            Predicate::AttributeEquals(key, value) => {
                element.attribute(key).as_deref() == Some(value.as_str())
            },
            Predicate::ChildTextEquals(test, value) => element
                .child_elements()
                .any(|child| test.matches(child) && child.text() == *value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis:       Axis,
    test:       NameTest,
    predicates: Vec<Predicate>,
}

impl Step {
    fn matches(&self, element: &Element) -> bool {
        self.test.matches(element) && self.predicates.iter().all(|p| p.matches(element))
    }
}

/// A compiled selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    steps:  Vec<Step>,
}

impl Selector {
    /// Compile `source`, resolving prefixes against `namespaces`
    pub fn parse(source: &str, namespaces: &Namespaces) -> MigrateResult<Self> {
        let steps = Parser::new(source, namespaces).parse()?;
        Ok(Self {
            source: source.to_string(),
            steps,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Paths of every matching element, in document order
    pub fn select(&self, doc: &Document) -> Vec<NodePath> {
        let mut current: Vec<NodePath> = vec![Vec::new()];

        for step in &self.steps {
            let mut next = Vec::new();
            for path in &current {
                let children = if path.is_empty() {
                    doc.nodes()
                } else {
                    match doc.element(path) {
                        Some(element) => element.children(),
                        None => continue,
                    }
                };
                collect(children, path, step, &mut next);
            }
            next.sort();
            next.dedup();
            current = next;
        }

        current
    }

    /// Whether at least one element matches
    pub fn matches_any(&self, doc: &Document) -> bool {
        !self.select(doc).is_empty()
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn collect(children: &[Node], parent: &[usize], step: &Step, out: &mut Vec<NodePath>) {
    for (index, node) in children.iter().enumerate() {
        let Node::Element(element) = node else {
            continue;
        };
        let mut path = parent.to_vec();
        path.push(index);

        if step.matches(element) {
            out.push(path.clone());
        }
        if step.axis == Axis::Descendant {
            collect(element.children(), &path, step, out);
        }
    }
}

/// Quote `value` as a selector literal
pub fn literal(value: &str) -> MigrateResult<String> {
    if !value.contains('\'') {
        Ok(format!("'{}'", value))
    } else if !value.contains('"') {
        Ok(format!("\"{}\"", value))
    } else {
        Err(MigrateError::selector(
            value,
            "literal contains both quote characters",
        ))
    }
}

struct Parser<'a> {
    source:     &'a str,
    chars:      std::iter::Peekable<std::str::CharIndices<'a>>,
    namespaces: &'a Namespaces,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, namespaces: &'a Namespaces) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            namespaces,
        }
    }

    fn error(&self, reason: impl Into<String>) -> MigrateError {
        MigrateError::selector(self.source, reason)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.chars.peek().map(|(_, c)| *c) == Some(expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn parse(mut self) -> MigrateResult<Vec<Step>> {
        let mut steps = Vec::new();

        while self.chars.peek().is_some() {
            if !self.eat('/') {
                return Err(self.error("expected `/` before each step"));
            }
            let axis = if self.eat('/') { Axis::Descendant } else { Axis::Child };

            let test = self.name_test()?;
            let mut predicates = Vec::new();
            while self.eat('[') {
                predicates.push(self.predicate()?);
                if !self.eat(']') {
                    return Err(self.error("unterminated predicate"));
                }
            }
            steps.push(Step {
                axis,
                test,
                predicates,
            });
        }

        if steps.is_empty() {
            return Err(self.error("empty selector"));
        }
        Ok(steps)
    }

    fn name(&mut self) -> String {
        let mut name = String::new();
        while let Some((_, c)) = self.chars.peek() {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':') {
                name.push(*c);
                self.chars.next();
            } else {
                break;
            }
        }
        name
    }

    fn name_test(&mut self) -> MigrateResult<NameTest> {
        if self.eat('*') {
            return Ok(NameTest::Any);
        }

        let qualified = self.name();
        if qualified.is_empty() {
            return Err(self.error("expected an element name or `*`"));
        }
        let (prefix, local) = match qualified.split_once(':') {
            Some((prefix, local)) => (Some(prefix), local),
            None => (None, qualified.as_str()),
        };
        if local.is_empty() || local.contains(':') {
            return Err(self.error(format!("malformed name `{}`", qualified)));
        }

        let namespace = self
            .namespaces
            .resolve(prefix)
            .ok_or_else(|| self.error(format!("unbound prefix `{}`", prefix.unwrap_or(""))))?;
        Ok(NameTest::Name {
            namespace,
            local: local.to_string(),
        })
    }

    fn rest(&mut self) -> &'a str {
        let source = self.source;
        self.chars.peek().map_or("", |(at, _)| &source[*at..])
    }

    fn predicate(&mut self) -> MigrateResult<Predicate> {
        if self.rest().starts_with("not(@") {
            self.chars.nth(4);
            let key = self.name();
            if key.is_empty() {
                return Err(self.error("expected an attribute name after `not(@`"));
            }
            if !self.eat(')') {
                return Err(self.error("expected `)` after the attribute name"));
            }
            return Ok(Predicate::LacksAttribute(key));
        }

        if self.eat('@') {
            let key = self.name();
            if key.is_empty() {
                return Err(self.error("expected an attribute name after `@`"));
            }
            if self.eat('=') {
                let value = self.literal()?;
                return Ok(Predicate::AttributeEquals(key, value));
            }
            return Ok(Predicate::HasAttribute(key));
        }

        let test = self.name_test()?;
        if !self.eat('=') {
            return Err(self.error("child predicates must compare against a literal"));
        }
        let value = self.literal()?;
        Ok(Predicate::ChildTextEquals(test, value))
    }

    fn literal(&mut self) -> MigrateResult<String> {
        let quote = match self.chars.next() {
            Some((_, c @ ('\'' | '"'))) => c,
            _ => return Err(self.error("expected a quoted literal")),
        };

        let mut value = String::new();
        for (_, c) in self.chars.by_ref() {
            if c == quote {
                return Ok(value);
            }
            value.push(c);
        }
        Err(self.error("unterminated literal"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = "http://schemas.microsoft.com/developer/msbuild/2003";

    fn namespaces() -> Namespaces {
        Namespaces::new().with_default(NS).with_prefix("ms", NS)
    }

    fn project() -> Document {
        Document::parse(
            r#"<Project xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <ItemDefinitionGroup>
    <ClCompile><WarningLevel>Level3</WarningLevel></ClCompile>
  </ItemDefinitionGroup>
  <ItemDefinitionGroup Condition="'$(Configuration)|$(Platform)'=='Debug|Win32'">
    <ClCompile><WarningLevel>Level3</WarningLevel></ClCompile>
    <Link><SubSystem>Console</SubSystem></Link>
  </ItemDefinitionGroup>
  <ItemDefinitionGroup Condition="'$(Configuration)|$(Platform)'=='Release|x64'">
    <ClCompile><WarningLevel>Level3</WarningLevel></ClCompile>
    <Link><SubSystem>Windows</SubSystem></Link>
  </ItemDefinitionGroup>
  <ItemGroup>
    <ProjectConfiguration Include="Debug|Win32" />
  </ItemGroup>
</Project>"#,
        )
        .unwrap()
    }

    #[test]
    fn test_conditioned_groups_only() {
        let doc = project();
        let selector = Selector::parse(
            "/ms:Project/ms:ItemDefinitionGroup[@Condition]/ms:ClCompile",
            &namespaces(),
        )
        .unwrap();
        assert_eq!(selector.select(&doc).len(), 2);

        let all = Selector::parse("/ms:Project/ms:ItemDefinitionGroup/ms:ClCompile", &namespaces())
            .unwrap();
        assert_eq!(all.select(&doc).len(), 3);
    }

    #[test]
    fn test_unprefixed_names_use_default_binding() {
        let doc = project();
        let prefixed = Selector::parse("/ms:Project/ms:ItemGroup", &namespaces()).unwrap();
        let plain = Selector::parse("/Project/ItemGroup", &namespaces()).unwrap();
        assert_eq!(prefixed.select(&doc), plain.select(&doc));

        let unbound = Selector::parse("/Project/ItemGroup", &Namespaces::new()).unwrap();
        assert!(unbound.select(&doc).is_empty());
    }

    #[test]
    fn test_descendant_attribute_equality() {
        let doc = project();
        let condition = literal("'$(Configuration)|$(Platform)'=='Debug|Win32'").unwrap();
        let selector =
            Selector::parse(&format!("//*[@Condition={}]", condition), &namespaces()).unwrap();
        let found = selector.select(&doc);
        assert_eq!(found.len(), 1);
        assert_eq!(doc.element(&found[0]).unwrap().local_name(), "ItemDefinitionGroup");

        let include = Selector::parse("//*[@Include='Debug|Win32']", &namespaces()).unwrap();
        assert_eq!(include.select(&doc).len(), 1);
    }

    #[test]
    fn test_missing_attribute_predicate() {
        let doc = project();
        let selector =
            Selector::parse("/ms:Project/ms:ItemDefinitionGroup[not(@Condition)]", &namespaces())
                .unwrap();
        let found = selector.select(&doc);
        assert_eq!(found, vec![vec![0, 1]]);

        assert!(Selector::parse("/Project[not(@)]", &namespaces()).is_err());
        assert!(Selector::parse("/Project[not(@Condition]", &namespaces()).is_err());
    }

    #[test]
    fn test_child_text_predicate() {
        let doc = project();
        let selector = Selector::parse(
            "/ms:Project/ms:ItemDefinitionGroup[@Condition]/ms:Link[ms:SubSystem='Console']",
            &namespaces(),
        )
        .unwrap();
        assert_eq!(selector.select(&doc).len(), 1);
    }

    #[test]
    fn test_results_are_in_document_order() {
        let doc = project();
        let selector = Selector::parse("//ms:WarningLevel", &namespaces()).unwrap();
        let found = selector.select(&doc);
        assert_eq!(found.len(), 3);
        let mut sorted = found.clone();
        sorted.sort();
        assert_eq!(found, sorted);
    }

    #[test]
    fn test_parse_errors() {
        let ns = namespaces();
        assert!(Selector::parse("", &ns).is_err());
        assert!(Selector::parse("Project", &ns).is_err());
        assert!(Selector::parse("/x:Project", &ns).is_err());
        assert!(Selector::parse("/Project[@Condition", &ns).is_err());
        assert!(Selector::parse("/Project[@Include='open]", &ns).is_err());
        assert!(Selector::parse("/Project[Child]", &ns).is_err());
    }

    #[test]
    fn test_literal_quoting() {
        assert_eq!(literal("Debug|Win32").unwrap(), "'Debug|Win32'");
        assert_eq!(literal("'a'=='b'").unwrap(), "\"'a'=='b'\"");
        assert!(literal("'\"").is_err());
    }
}
