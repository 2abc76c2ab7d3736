use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// Reference to a type by name, optionally bound to type arguments.
///
/// `OrderedList<Widget>` is a closed instantiation; `OrderedList` (no
/// arguments) names the definition itself, which for a generic definition
/// means the unbound shape.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TypeRef {
    name: String,
    args: Vec<TypeRef>,
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn generic(name: impl Into<String>, args: Vec<TypeRef>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    pub fn parse(input: &str) -> Result<Self, RegistryError> {
        let mut parser = RefParser { input, pos: 0 };
        let parsed = parser.parse_ref().and_then(|value| {
            parser.skip_ws();
            if parser.pos < input.len() {
                Err(format!("unexpected input at offset {}", parser.pos))
            } else {
                Ok(value)
            }
        });
        parsed.map_err(|reason| RegistryError::InvalidTypeRef {
            input: input.to_string(),
            reason,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[TypeRef] {
        &self.args
    }

    pub fn is_bound(&self) -> bool {
        !self.args.is_empty()
    }

    pub fn definition(&self) -> TypeRef {
        TypeRef::named(self.name.clone())
    }

    pub fn with_args(&self, args: &[TypeRef]) -> TypeRef {
        TypeRef::generic(self.name.clone(), args.to_vec())
    }

    /// Substitutes `args` for the parameter names in `params`, recursively.
    /// Extra parameters or arguments are left alone.
    pub fn instantiate(&self, params: &[String], args: &[TypeRef]) -> TypeRef {
        if params.is_empty() || args.is_empty() {
            return self.clone();
        }
        let bindings: HashMap<&str, &TypeRef> = params
            .iter()
            .map(String::as_str)
            .zip(args.iter())
            .collect();
        self.substitute(&bindings)
    }

    fn substitute(&self, bindings: &HashMap<&str, &TypeRef>) -> TypeRef {
        if self.args.is_empty() {
            if let Some(bound) = bindings.get(self.name.as_str()) {
                return (*bound).clone();
            }
        }
        TypeRef {
            name: self.name.clone(),
            args: self.args.iter().map(|arg| arg.substitute(bindings)).collect(),
        }
    }

    /// True when this reference is exactly `Name<P1, .., Pn>` for the given
    /// parameter list, i.e. the definition spelled out with its own params.
    pub fn is_self_parameterised(&self, params: &[String]) -> bool {
        !params.is_empty()
            && self.args.len() == params.len()
            && self
                .args
                .iter()
                .zip(params)
                .all(|(arg, param)| !arg.is_bound() && arg.name == *param)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.args.is_empty() {
            f.write_str("<")?;
            for (idx, arg) in self.args.iter().enumerate() {
                if idx > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{arg}")?;
            }
            f.write_str(">")?;
        }
        Ok(())
    }
}

impl FromStr for TypeRef {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TypeRef::parse(s)
    }
}

impl TryFrom<String> for TypeRef {
    type Error = RegistryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TypeRef::parse(&value)
    }
}

impl From<TypeRef> for String {
    fn from(value: TypeRef) -> Self {
        value.to_string()
    }
}

/// Plain name, no argument parsing. Use [`TypeRef::parse`] for `A<B>` syntax.
impl From<&str> for TypeRef {
    fn from(value: &str) -> Self {
        TypeRef::named(value)
    }
}

struct RefParser<'a> {
    input: &'a str,
    pos: usize,
}

impl RefParser<'_> {
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn parse_ref(&mut self) -> Result<TypeRef, String> {
        self.skip_ws();
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, '<' | '>' | ',') || c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
        if start == self.pos {
            return Err(format!("expected a type name at offset {start}"));
        }
        let name = self.input[start..self.pos].to_string();
        self.skip_ws();

        let mut args = Vec::new();
        if self.peek() == Some('<') {
            self.pos += 1;
            loop {
                args.push(self.parse_ref()?);
                self.skip_ws();
                match self.peek() {
                    Some(',') => self.pos += 1,
                    Some('>') => {
                        self.pos += 1;
                        break;
                    }
                    _ => return Err(format!("expected ',' or '>' at offset {}", self.pos)),
                }
            }
        }
        Ok(TypeRef { name, args })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Contract,
    Concrete,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypeDef {
    pub name: String,
    pub kind: TypeKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<String>,
    /// Contracts declared directly: super contracts for a contract,
    /// implemented contracts for a concrete type.
    #[serde(
        default,
        alias = "extends",
        alias = "implements",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub declares: Vec<TypeRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<TypeRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deserialize_as: Option<TypeRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preferred_for: Vec<TypeRef>,
    /// Wire property name to the contract of the collection elements it holds.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, TypeRef>,
}

impl TypeDef {
    fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            params: Vec::new(),
            declares: Vec::new(),
            base: None,
            tags: Vec::new(),
            deserialize_as: None,
            preferred_for: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    pub fn contract(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Contract)
    }

    pub fn concrete(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Concrete)
    }

    pub fn params(mut self, params: &[&str]) -> Self {
        self.params = params.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn extends(mut self, contract: impl Into<TypeRef>) -> Self {
        self.declares.push(contract.into());
        self
    }

    pub fn implements(mut self, contract: impl Into<TypeRef>) -> Self {
        self.declares.push(contract.into());
        self
    }

    pub fn base(mut self, base: impl Into<TypeRef>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn deserialize_as(mut self, concrete: impl Into<TypeRef>) -> Self {
        self.deserialize_as = Some(concrete.into());
        self
    }

    pub fn preferred_for(mut self, contract: impl Into<TypeRef>) -> Self {
        self.preferred_for.push(contract.into());
        self
    }

    pub fn property(mut self, wire_name: impl Into<String>, element: impl Into<TypeRef>) -> Self {
        self.properties.insert(wire_name.into(), element.into());
        self
    }

    pub fn is_contract(&self) -> bool {
        self.kind == TypeKind::Contract
    }

    pub fn is_generic_definition(&self) -> bool {
        !self.params.is_empty()
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn type_ref(&self) -> TypeRef {
        TypeRef::named(self.name.clone())
    }

    /// Strips `Self<P1..Pn>` spelled with this definition's own parameters back
    /// to the unbound reference, leaving every other reference untouched.
    pub fn unbind(&self, reference: &TypeRef) -> TypeRef {
        if reference.is_self_parameterised(&self.params) {
            reference.definition()
        } else {
            reference.clone()
        }
    }
}
