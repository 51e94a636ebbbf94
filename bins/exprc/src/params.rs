use std::str::FromStr;

use anyhow::Context;
use exprc_engine::{Compiled, Compiler, Type, Value};

/// A free variable given on the command line as `name:type` or `name:type=value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    /// Type name in source syntax, resolved against the compiler later.
    pub ty: String,
    /// Value in expression syntax, such as `2.5`, `"text"` or `null`.
    pub value: Option<String>,
}

impl FromStr for ParamSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (head, value) = match s.split_once('=') {
            Some((head, value)) => (head, Some(value.trim().to_string())),
            None => (s, None),
        };
        let (name, ty) = head.split_once(':').ok_or_else(|| {
            anyhow::anyhow!("Invalid parameter format. Expected 'name:type' or 'name:type=value'")
        })?;
        let name = name.trim();
        if name.is_empty() || !name.chars().all(|ch| ch.is_alphanumeric() || ch == '_') {
            anyhow::bail!("Invalid parameter name: '{}'", name);
        }
        Ok(ParamSpec {
            name: name.to_string(),
            ty: ty.trim().to_string(),
            value,
        })
    }
}

impl ParamSpec {
    pub fn resolve_type(&self, compiler: &Compiler) -> anyhow::Result<Type> {
        compiler
            .resolver()
            .resolve_type(&self.ty)
            .ok_or_else(|| {
                anyhow::anyhow!("Unknown type '{}' for parameter {}", self.ty, self.name)
            })
    }

    /// Evaluate the value text and convert it to the declared type.
    pub fn resolve_value(&self, compiler: &Compiler) -> anyhow::Result<Value> {
        let ty = self.resolve_type(compiler)?;
        let text = self.value.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "Parameter {} needs a value, use {}:{}=<value>",
                self.name,
                self.name,
                self.ty
            )
        })?;
        let tree = compiler
            .parse(text)
            .with_context(|| format!("parsing the value of {}", self.name))?;
        let value = Compiled::new(tree)
            .invoke(&[])
            .with_context(|| format!("evaluating the value of {}", self.name))?;
        Ok(value.convert_to(&ty)?)
    }
}

/// Names and resolved types of `params`, in order.
pub fn signature(
    params: &[ParamSpec],
    compiler: &Compiler,
) -> anyhow::Result<(Vec<String>, Vec<Type>)> {
    let names = params.iter().map(|param| param.name.clone()).collect();
    let types = params
        .iter()
        .map(|param| param.resolve_type(compiler))
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok((names, types))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_type_and_value() {
        let spec: ParamSpec = "x:double=2.5".parse().unwrap();
        assert_eq!(spec.name, "x");
        assert_eq!(spec.ty, "double");
        assert_eq!(spec.value.as_deref(), Some("2.5"));

        let spec: ParamSpec = "items : List<int>".parse().unwrap();
        assert_eq!(spec.name, "items");
        assert_eq!(spec.ty, "List<int>");
        assert_eq!(spec.value, None);
    }

    #[test]
    fn rejects_malformed_specs() {
        assert!("x".parse::<ParamSpec>().is_err());
        assert!(":int".parse::<ParamSpec>().is_err());
        assert!("a b:int".parse::<ParamSpec>().is_err());
    }

    #[test]
    fn values_are_converted_to_the_declared_type() -> anyhow::Result<()> {
        let compiler = Compiler::standard();
        let spec: ParamSpec = "x:double=2".parse()?;
        assert_eq!(spec.resolve_value(&compiler)?, Value::Double(2.0));

        let spec: ParamSpec = "s:string=null".parse()?;
        assert!(spec.resolve_value(&compiler)?.is_null());

        let spec: ParamSpec = "n:int".parse()?;
        assert!(spec.resolve_value(&compiler).is_err());
        Ok(())
    }
}
