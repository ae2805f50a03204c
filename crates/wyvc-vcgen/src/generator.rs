//! Refinement-predicate elaboration for named types.
//!
//! Given `type nat is int where $ >= 0`, the check for `nat` is a block
//! over one input slot comparing `$` against zero and failing otherwise.
//! This module compiles such blocks: the structural part is derived from
//! the surface type (element checks spliced under `forall` for collections,
//! per-component loads for tuples and records), and the explicit `where`
//! clause — already lowered by the surface compiler — is appended.
//!
//! Results are memoized by qualified name. For names outside the current
//! source set the precompiled check is fetched from the module loader.

use std::collections::HashMap;

use wyvc_ir::block::{Block, LabelAllocator};
use wyvc_ir::codes::Code;
use wyvc_ir::name::QualifiedName;

use crate::error::VcError;
use crate::surface::{ModuleLoader, NameResolver, SourceUnits, SurfaceType};

#[derive(Clone)]
enum CacheEntry {
    /// Elaboration for this name is on the stack; re-entry means the
    /// refinement is recursive, which is not supported.
    InProgress,
    Done(Option<Block>),
}

/// Elaborates and memoizes refinement-check blocks for named types.
pub struct GlobalGenerator<'a> {
    sources: &'a dyn SourceUnits,
    resolver: &'a dyn NameResolver,
    loader: &'a dyn ModuleLoader,
    cache: HashMap<QualifiedName, CacheEntry>,
    labels: LabelAllocator,
}

impl<'a> GlobalGenerator<'a> {
    pub fn new(
        sources: &'a dyn SourceUnits,
        resolver: &'a dyn NameResolver,
        loader: &'a dyn ModuleLoader,
    ) -> Self {
        GlobalGenerator {
            sources,
            resolver,
            loader,
            cache: HashMap::new(),
            labels: LabelAllocator::new(),
        }
    }

    /// The refinement-check block for a named type, or `None` when the name
    /// carries no refinement.
    pub fn generate(&mut self, name: &QualifiedName) -> Result<Option<Block>, VcError> {
        match self.cache.get(name) {
            Some(CacheEntry::Done(block)) => return Ok(block.clone()),
            Some(CacheEntry::InProgress) => {
                return Err(VcError::UnsupportedFeature(format!(
                    "recursive refinement on {name}"
                )))
            }
            None => {}
        }

        let sources = self.sources;
        if let Some(def) = sources.type_def(name) {
            let surface = def.surface.clone();
            let explicit = def.constraint.clone();
            // Claim the name before descending so that recursion through a
            // nominal reference is detected rather than looping.
            self.cache.insert(name.clone(), CacheEntry::InProgress);
            let result = self.generate_definition(&surface, explicit.as_ref());
            match &result {
                Ok(block) => {
                    tracing::debug!(%name, constrained = block.is_some(),
                        "elaborated type refinement");
                    self.cache
                        .insert(name.clone(), CacheEntry::Done(block.clone()));
                }
                Err(_) => {
                    self.cache.remove(name);
                }
            }
            return result;
        }

        // Not in the source set: fetch the precompiled check.
        let module = self.loader.load_module(name.module())?;
        match module.type_decl(name.name()) {
            Some(decl) => {
                let block = decl.constraint.clone();
                self.cache
                    .insert(name.clone(), CacheEntry::Done(block.clone()));
                Ok(block)
            }
            None => Err(VcError::UnresolvedName(name.clone())),
        }
    }

    fn generate_definition(
        &mut self,
        surface: &SurfaceType,
        explicit: Option<&Block>,
    ) -> Result<Option<Block>, VcError> {
        let structural = self.generate_surface(surface)?;
        match (structural, explicit) {
            (None, None) => Ok(None),
            (structural, explicit) => {
                let mut block = structural.unwrap_or_default();
                if let Some(constraint) = explicit {
                    block.append(&constraint.relabel(&mut self.labels));
                }
                Ok(Some(block))
            }
        }
    }

    /// Elaborate the structural part of a surface type. `None` means the
    /// type imposes no predicate of its own.
    fn generate_surface(&mut self, surface: &SurfaceType) -> Result<Option<Block>, VcError> {
        match surface {
            SurfaceType::List(element) | SurfaceType::Set(element) => {
                let Some(check) = self.generate_surface(element)? else {
                    return Ok(None);
                };
                // Iterate the value in slot 0 with the element in slot 1,
                // the spliced check reading its input from there.
                let collection = self.resolver.resolve_type(surface)?;
                let end = self.labels.fresh();
                let mut block = Block::new();
                block.push(Code::ForAll {
                    ty: collection,
                    source: 0,
                    index: 1,
                    target: end.clone(),
                    modified: Vec::new(),
                });
                block.append(&self.shift_block(1, &check));
                block.push(Code::LoopEnd { label: end });
                Ok(Some(block))
            }
            SurfaceType::Tuple(elements) => {
                let tuple = self.resolver.resolve_type(surface)?;
                let mut block: Option<Block> = None;
                for (i, element) in elements.iter().enumerate() {
                    if let Some(check) = self.generate_surface(element)? {
                        let host = block.get_or_insert_with(Block::new);
                        host.push(Code::TupleLoad {
                            ty: tuple.clone(),
                            target: 1,
                            operand: 0,
                            index: i,
                        });
                        host.append(&self.shift_block(1, &check));
                    }
                }
                Ok(block)
            }
            SurfaceType::Record(fields) => {
                let record = self.resolver.resolve_type(surface)?;
                let mut block: Option<Block> = None;
                for (field, element) in fields {
                    if let Some(check) = self.generate_surface(element)? {
                        let host = block.get_or_insert_with(Block::new);
                        host.push(Code::FieldLoad {
                            ty: record.clone(),
                            target: 1,
                            operand: 0,
                            field: field.clone(),
                        });
                        host.append(&self.shift_block(1, &check));
                    }
                }
                Ok(block)
            }
            SurfaceType::Union(bounds) => {
                let mut constrained = false;
                for bound in bounds {
                    if self.generate_surface(bound)?.is_some() {
                        constrained = true;
                    }
                }
                if constrained {
                    // Checking a refined bound requires a sound type-test
                    // chain over possibly-recursive bounds, which this
                    // elaboration does not have.
                    return Err(VcError::UnsupportedFeature(
                        "refinement under a union type".to_string(),
                    ));
                }
                // A bare type test imposes no additional predicate.
                Ok(None)
            }
            SurfaceType::Map(key, value) => {
                if self.generate_surface(key)?.is_some()
                    || self.generate_surface(value)?.is_some()
                {
                    return Err(VcError::UnsupportedFeature(
                        "refinement under a map type".to_string(),
                    ));
                }
                Ok(None)
            }
            SurfaceType::Reference(element) => {
                if self.generate_surface(element)?.is_some() {
                    return Err(VcError::UnsupportedFeature(
                        "refinement under a reference type".to_string(),
                    ));
                }
                Ok(None)
            }
            SurfaceType::Intersection(bounds) => {
                for bound in bounds {
                    if self.generate_surface(bound)?.is_some() {
                        return Err(VcError::UnsupportedFeature(
                            "refinement under an intersection type".to_string(),
                        ));
                    }
                }
                Ok(None)
            }
            SurfaceType::Negation(element) => {
                if self.generate_surface(element)?.is_some() {
                    return Err(VcError::UnsupportedFeature(
                        "refinement under a negation type".to_string(),
                    ));
                }
                Ok(None)
            }
            SurfaceType::Nominal(names) => {
                let name = self.resolver.resolve_name(names)?;
                self.generate(&name)
            }
            // Primitive bases impose nothing.
            _ => Ok(None),
        }
    }

    /// Shift a check block's slots up by `amount` (its input lands on the
    /// host's staging slot) and freshen its labels so repeated splices of
    /// one check never collide.
    fn shift_block(&mut self, amount: usize, block: &Block) -> Block {
        block.shift(amount).relabel(&mut self.labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    use wyvc_ir::codes::Comparator;
    use wyvc_ir::constant::Constant;
    use wyvc_ir::module::{Declaration, TypeDecl, WyilFile};
    use wyvc_ir::name::PathId;
    use wyvc_ir::types::Type;

    use crate::surface::SourceTypeDef;

    struct Sources {
        defs: Map<QualifiedName, SourceTypeDef>,
    }

    impl SourceUnits for Sources {
        fn type_def(&self, name: &QualifiedName) -> Option<&SourceTypeDef> {
            self.defs.get(name)
        }
    }

    struct Resolver {
        module: PathId,
    }

    impl NameResolver for Resolver {
        fn resolve_name(&self, names: &[String]) -> Result<QualifiedName, VcError> {
            match names.split_last() {
                Some((name, [])) => Ok(QualifiedName::new(self.module.clone(), name.clone())),
                Some((name, module)) => Ok(QualifiedName::new(
                    PathId::from_segments(module.iter().cloned()),
                    name.clone(),
                )),
                None => Err(VcError::UnsupportedFeature("empty name".to_string())),
            }
        }

        fn resolve_type(&self, ty: &SurfaceType) -> Result<Type, VcError> {
            Ok(match ty {
                SurfaceType::Int => Type::Int,
                SurfaceType::List(e) => Type::list(self.resolve_type(e)?),
                SurfaceType::Set(e) => Type::set(self.resolve_type(e)?),
                SurfaceType::Tuple(es) => Type::tuple(
                    es.iter()
                        .map(|e| self.resolve_type(e))
                        .collect::<Result<_, _>>()?,
                ),
                SurfaceType::Record(fs) => Type::Record {
                    fields: fs
                        .iter()
                        .map(|(k, v)| Ok((k.clone(), self.resolve_type(v)?)))
                        .collect::<Result<_, VcError>>()?,
                    open: false,
                },
                SurfaceType::Nominal(names) => {
                    Type::Nominal(self.resolve_name(names)?)
                }
                _ => Type::Any,
            })
        }
    }

    struct NoModules;

    impl ModuleLoader for NoModules {
        fn load_module(&self, module: &PathId) -> Result<WyilFile, VcError> {
            Err(VcError::UnresolvedName(QualifiedName::new(
                module.clone(),
                "?",
            )))
        }
    }

    fn nat_constraint() -> Block {
        let mut block = Block::new();
        block.push(Code::Const { target: 1, constant: Constant::integer(0) });
        block.push(Code::If {
            ty: Type::Int,
            left: 0,
            right: 1,
            cmp: Comparator::Ge,
            target: "exit".to_string(),
        });
        block.push(Code::Fail { message: "constraint not satisfied".to_string() });
        block.push(Code::Label { label: "exit".to_string() });
        block
    }

    fn module() -> PathId {
        PathId::from_segments(["main"])
    }

    fn nat() -> QualifiedName {
        QualifiedName::new(module(), "nat")
    }

    fn sources_with(defs: Vec<(QualifiedName, SourceTypeDef)>) -> Sources {
        Sources { defs: defs.into_iter().collect() }
    }

    fn nat_def() -> (QualifiedName, SourceTypeDef) {
        (
            nat(),
            SourceTypeDef {
                name: "nat".to_string(),
                surface: SurfaceType::Int,
                constraint: Some(nat_constraint()),
            },
        )
    }

    #[test]
    fn unconstrained_type_generates_nothing() {
        let sources = sources_with(vec![(
            nat(),
            SourceTypeDef {
                name: "nat".to_string(),
                surface: SurfaceType::Int,
                constraint: None,
            },
        )]);
        let resolver = Resolver { module: module() };
        let mut generator = GlobalGenerator::new(&sources, &resolver, &NoModules);
        assert_eq!(generator.generate(&nat()).unwrap(), None);
    }

    #[test]
    fn explicit_constraint_is_returned_relabelled() {
        let sources = sources_with(vec![nat_def()]);
        let resolver = Resolver { module: module() };
        let mut generator = GlobalGenerator::new(&sources, &resolver, &NoModules);
        let block = generator.generate(&nat()).unwrap().expect("check block");
        // Relabelling preserves bijective equality with the original.
        assert_eq!(block, nat_constraint());
    }

    #[test]
    fn generation_is_memoized() {
        let sources = sources_with(vec![nat_def()]);
        let resolver = Resolver { module: module() };
        let mut generator = GlobalGenerator::new(&sources, &resolver, &NoModules);
        let first = generator.generate(&nat()).unwrap();
        let second = generator.generate(&nat()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn list_of_constrained_element_wraps_in_forall() {
        let list_name = QualifiedName::new(module(), "nats");
        let sources = sources_with(vec![
            nat_def(),
            (
                list_name.clone(),
                SourceTypeDef {
                    name: "nats".to_string(),
                    surface: SurfaceType::list(SurfaceType::nominal(["nat"])),
                    constraint: None,
                },
            ),
        ]);
        let resolver = Resolver { module: module() };
        let mut generator = GlobalGenerator::new(&sources, &resolver, &NoModules);
        let block = generator.generate(&list_name).unwrap().expect("check block");

        // forall ... spliced check (shifted up one slot) ... loop end
        assert!(matches!(
            block.get(0).code,
            Code::ForAll { source: 0, index: 1, .. }
        ));
        assert!(matches!(
            block.get(block.size() - 1).code,
            Code::LoopEnd { .. }
        ));
        // The spliced nat check reads the element from slot 1.
        assert!(matches!(
            block.get(1).code,
            Code::Const { target: 2, .. }
        ));
        assert!(matches!(
            block.get(2).code,
            Code::If { left: 1, right: 2, cmp: Comparator::Ge, .. }
        ));
        assert!(block.validate().is_ok());
    }

    #[test]
    fn record_field_checks_load_each_field() {
        let point = QualifiedName::new(module(), "point");
        let mut fields = std::collections::BTreeMap::new();
        fields.insert("x".to_string(), SurfaceType::nominal(["nat"]));
        fields.insert("y".to_string(), SurfaceType::Int);
        let sources = sources_with(vec![
            nat_def(),
            (
                point.clone(),
                SourceTypeDef {
                    name: "point".to_string(),
                    surface: SurfaceType::Record(fields),
                    constraint: None,
                },
            ),
        ]);
        let resolver = Resolver { module: module() };
        let mut generator = GlobalGenerator::new(&sources, &resolver, &NoModules);
        let block = generator.generate(&point).unwrap().expect("check block");
        // Only the constrained field x contributes a load.
        assert!(matches!(
            &block.get(0).code,
            Code::FieldLoad { target: 1, operand: 0, field, .. } if field == "x"
        ));
        assert!(block.validate().is_ok());
    }

    #[test]
    fn union_of_unconstrained_bounds_generates_nothing() {
        let u = QualifiedName::new(module(), "u");
        let sources = sources_with(vec![(
            u.clone(),
            SourceTypeDef {
                name: "u".to_string(),
                surface: SurfaceType::Union(vec![SurfaceType::Int, SurfaceType::Null]),
                constraint: None,
            },
        )]);
        let resolver = Resolver { module: module() };
        let mut generator = GlobalGenerator::new(&sources, &resolver, &NoModules);
        assert_eq!(generator.generate(&u).unwrap(), None);
    }

    #[test]
    fn union_with_refined_bound_is_unsupported() {
        let u = QualifiedName::new(module(), "u");
        let sources = sources_with(vec![
            nat_def(),
            (
                u.clone(),
                SourceTypeDef {
                    name: "u".to_string(),
                    surface: SurfaceType::Union(vec![
                        SurfaceType::nominal(["nat"]),
                        SurfaceType::Null,
                    ]),
                    constraint: None,
                },
            ),
        ]);
        let resolver = Resolver { module: module() };
        let mut generator = GlobalGenerator::new(&sources, &resolver, &NoModules);
        assert!(matches!(
            generator.generate(&u),
            Err(VcError::UnsupportedFeature(_))
        ));
    }

    #[test]
    fn map_with_refined_value_is_unsupported() {
        let m = QualifiedName::new(module(), "m");
        let sources = sources_with(vec![
            nat_def(),
            (
                m.clone(),
                SourceTypeDef {
                    name: "m".to_string(),
                    surface: SurfaceType::Map(
                        Box::new(SurfaceType::Int),
                        Box::new(SurfaceType::nominal(["nat"])),
                    ),
                    constraint: None,
                },
            ),
        ]);
        let resolver = Resolver { module: module() };
        let mut generator = GlobalGenerator::new(&sources, &resolver, &NoModules);
        assert!(matches!(
            generator.generate(&m),
            Err(VcError::UnsupportedFeature(_))
        ));
    }

    #[test]
    fn recursive_refinement_fails_cleanly() {
        // type t is [t] where ... -- the nominal refers back to itself.
        let t = QualifiedName::new(module(), "t");
        let sources = sources_with(vec![(
            t.clone(),
            SourceTypeDef {
                name: "t".to_string(),
                surface: SurfaceType::list(SurfaceType::nominal(["t"])),
                constraint: Some(nat_constraint()),
            },
        )]);
        let resolver = Resolver { module: module() };
        let mut generator = GlobalGenerator::new(&sources, &resolver, &NoModules);
        assert!(matches!(
            generator.generate(&t),
            Err(VcError::UnsupportedFeature(_))
        ));
    }

    #[test]
    fn unknown_name_is_unresolved() {
        let sources = sources_with(vec![]);
        let resolver = Resolver { module: module() };
        let mut generator = GlobalGenerator::new(&sources, &resolver, &NoModules);
        assert!(matches!(
            generator.generate(&nat()),
            Err(VcError::UnresolvedName(_))
        ));
    }

    #[test]
    fn precompiled_module_supplies_check() {
        struct Library {
            module: PathId,
        }
        impl ModuleLoader for Library {
            fn load_module(&self, module: &PathId) -> Result<WyilFile, VcError> {
                if module != &self.module {
                    return Err(VcError::UnresolvedName(QualifiedName::new(
                        module.clone(),
                        "?",
                    )));
                }
                Ok(WyilFile::new(
                    module.clone(),
                    "lib.whiley",
                    vec![Declaration::Type(TypeDecl {
                        name: "nat".to_string(),
                        ty: Type::Int,
                        constraint: Some(nat_constraint()),
                    })],
                )
                .expect("valid module"))
            }
        }
        let lib_module = PathId::from_segments(["lib"]);
        let sources = sources_with(vec![]);
        let resolver = Resolver { module: module() };
        let loader = Library { module: lib_module.clone() };
        let mut generator = GlobalGenerator::new(&sources, &resolver, &loader);
        let name = QualifiedName::new(lib_module, "nat");
        let block = generator.generate(&name).unwrap().expect("check block");
        assert_eq!(block, nat_constraint());
    }
}
