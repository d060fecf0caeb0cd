//! Deterministic naming of circuit variables
//!
//! Every circuit argument stream (secret inputs, public inputs, public
//! outputs, temporaries) owns one [`NameFactory`]. Names are issued in
//! order and the factory records the size of every issued value, so the
//! buffer layout of a circuit is fully determined by the order of issuance.

use serde::{Deserialize, Serialize};
use zkay_runtime::CompilerConfig;

use super::ir::{CircuitExpr, HybridArgType, HybridArgumentIdf};
use crate::ast::types::TypeName;

/// Position of a circuit variable inside its argument buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub name: String,
    pub ty: TypeName,
    /// Offset in uint256 words from the start of the buffer
    pub offset: usize,
    pub size: usize,
}

#[derive(Debug, Clone)]
pub struct NameFactory {
    base_name: String,
    arg_type: HybridArgType,
    config: CompilerConfig,
    count: usize,
    size: usize,
    idfs: Vec<HybridArgumentIdf>,
}

impl NameFactory {
    pub fn new(base_name: impl Into<String>, arg_type: HybridArgType, config: &CompilerConfig) -> Self {
        Self {
            base_name: base_name.into(),
            arg_type,
            config: config.clone(),
            count: 0,
            size: 0,
            idfs: Vec::new(),
        }
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// The name the next issued value will get, without issuing it
    ///
    /// ```
    /// use zkay_compiler::ast::types::TypeName;
    /// use zkay_compiler::circuit::ir::HybridArgType;
    /// use zkay_compiler::circuit::names::NameFactory;
    /// use zkay_runtime::CompilerConfig;
    ///
    /// let mut f = NameFactory::new("zk__in", HybridArgType::PubCircuitArg, &CompilerConfig::default());
    /// assert_eq!(f.new_name(&TypeName::Cipher), "zk__in0_cipher");
    /// f.get_new_idf(TypeName::Bool, None);
    /// assert_eq!(f.new_name(&TypeName::Key), "zk__in1_key");
    /// ```
    pub fn new_name(&self, ty: &TypeName) -> String {
        let postfix = match ty {
            TypeName::Key => "key",
            TypeName::Cipher => "cipher",
            _ => "plain",
        };
        format!("{}{}_{}", self.base_name, self.count, postfix)
    }

    /// Issues a value with a generated name
    pub fn get_new_idf(&mut self, ty: TypeName, priv_expr: Option<CircuitExpr>) -> HybridArgumentIdf {
        let name = self.new_name(&ty);
        self.add_idf(name, ty).with_priv_expr(priv_expr)
    }

    /// Issues a value with an explicitly chosen name
    pub fn add_idf(&mut self, name: impl Into<String>, ty: TypeName) -> HybridArgumentIdf {
        let idf = HybridArgumentIdf::new(name, ty, self.arg_type);
        self.count += 1;
        self.size += idf.ty.size_in_uints(&self.config);
        self.idfs.push(idf.clone());
        idf
    }

    /// Patches the recorded private expression of an issued value
    pub fn set_priv_expr(&mut self, name: &str, expr: CircuitExpr) {
        if let Some(idf) = self.idfs.iter_mut().find(|i| i.name == name) {
            idf.corresponding_priv_expr = Some(expr);
        }
    }

    /// Total size of all issued values in uint256 words
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn idfs(&self) -> &[HybridArgumentIdf] {
        &self.idfs
    }

    /// Contiguous buffer layout in issuance order
    pub fn layout(&self) -> Vec<Slot> {
        let mut offset = 0;
        self.idfs
            .iter()
            .map(|idf| {
                let size = idf.ty.size_in_uints(&self.config);
                let slot = Slot { name: idf.name.clone(), ty: idf.ty.clone(), offset, size };
                offset += size;
                slot
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zkay_runtime::CryptoBackend;

    #[test]
    fn test_names_are_type_suffixed() {
        let mut f = NameFactory::new("secret", HybridArgType::PrivCircuitVal, &CompilerConfig::default());
        assert_eq!(f.get_new_idf(TypeName::uint(), None).name, "secret0_plain");
        assert_eq!(f.get_new_idf(TypeName::Cipher, None).name, "secret1_cipher");
        assert_eq!(f.get_new_idf(TypeName::Key, None).name, "secret2_key");
    }

    #[test]
    fn test_add_idf_advances_counter() {
        let mut f = NameFactory::new("tmp", HybridArgType::TmpCircuitVal, &CompilerConfig::default());
        f.add_idf("custom", TypeName::Bool);
        assert_eq!(f.new_name(&TypeName::Bool), "tmp1_plain");
    }

    #[test]
    fn test_layout_offsets_follow_sizes() {
        let config = CompilerConfig::default().with_crypto_backend(CryptoBackend::Elgamal);
        let mut f = NameFactory::new("zk__in", HybridArgType::PubCircuitArg, &config);
        f.get_new_idf(TypeName::Cipher, None);
        f.get_new_idf(TypeName::uint(), None);
        f.get_new_idf(TypeName::Key, None);

        let layout = f.layout();
        let cipher_len = config.crypto_params().cipher_len();
        assert_eq!(layout[0].offset, 0);
        assert_eq!(layout[0].size, cipher_len);
        assert_eq!(layout[1].offset, cipher_len);
        assert_eq!(layout[2].offset, cipher_len + 1);
        assert_eq!(f.size(), cipher_len + 1 + config.crypto_params().key_len());
    }
}
