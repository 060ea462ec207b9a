//
//  workspace.rs
//  typegraph
//

use std::collections::{BTreeMap, HashMap, HashSet};

use super::types::{NamedRef, TypeExpr, TypeIdentity};
use super::unit::{default_package_name, SourceUnit, TypeDecl, UnitId};

/// Location of a declaration inside the workspace.
#[derive(Debug, Clone, Copy)]
struct DeclRef {
    unit: UnitId,
    group: usize,
    decl: usize,
}

/// The analyzed unit set of one generation run.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    units: Vec<SourceUnit>,
    /// Index: identity -> declaration (first declaration wins).
    decls: HashMap<TypeIdentity, DeclRef>,
    /// Index: package path -> units of that package.
    packages: BTreeMap<String, Vec<UnitId>>,
}

impl Workspace {
    /// Assemble a workspace. Unit ids are reassigned to their position.
    ///
    /// References through an import whose package clause differs from the
    /// last element of its path (`go-money` declaring `package money`) are
    /// bound to the import path here, once every package name is known.
    pub fn new(mut units: Vec<SourceUnit>) -> Self {
        let mut names: HashMap<String, String> = HashMap::new();
        for unit in &units {
            names
                .entry(unit.package_path.clone())
                .or_insert_with(|| unit.package_name.clone());
        }
        for unit in &mut units {
            requalify(unit, &names);
        }

        let mut ws = Self::default();
        for (i, mut unit) in units.into_iter().enumerate() {
            let id = UnitId(i);
            unit.id = id;
            for (g, group) in unit.groups.iter().enumerate() {
                for (d, decl) in group.decls.iter().enumerate() {
                    ws.decls
                        .entry(unit.identity_of(decl))
                        .or_insert(DeclRef {
                            unit: id,
                            group: g,
                            decl: d,
                        });
                }
            }
            ws.packages
                .entry(unit.package_path.clone())
                .or_default()
                .push(id);
            ws.units.push(unit);
        }
        ws
    }

    pub fn units(&self) -> &[SourceUnit] {
        &self.units
    }

    pub fn unit(&self, id: UnitId) -> Option<&SourceUnit> {
        self.units.get(id.0)
    }

    pub fn has_package(&self, path: &str) -> bool {
        self.packages.contains_key(path)
    }

    pub fn packages(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    /// Name declared by the package clause of the workspace package `path`.
    pub fn package_name(&self, path: &str) -> Option<&str> {
        let id = self.packages.get(path)?.first()?;
        self.unit(*id).map(|unit| unit.package_name.as_str())
    }

    /// Declaration of `id` together with its unit.
    pub fn lookup_with_unit(&self, id: &TypeIdentity) -> Option<(&SourceUnit, &TypeDecl)> {
        let r = self.decls.get(id)?;
        let unit = self.units.get(r.unit.0)?;
        let decl = unit.groups.get(r.group)?.decls.get(r.decl)?;
        Some((unit, decl))
    }

    pub fn lookup(&self, id: &TypeIdentity) -> Option<&TypeDecl> {
        self.lookup_with_unit(id).map(|(_, decl)| decl)
    }

    /// Target of `r` if it names an alias declaration, instantiated with its arguments.
    pub fn resolve_alias(&self, r: &NamedRef) -> Option<TypeExpr> {
        self.lookup(&r.id)
            .filter(|decl| decl.is_alias())
            .map(|decl| decl.instantiate(&r.args))
    }

    /// Fully unwrapped definition of the declaration `id`.
    ///
    /// Follows the right-hand side through named declarations of the workspace,
    /// binding generic arguments along the way. Returns `None` when the chain
    /// leaves the workspace or revisits a declaration.
    pub fn underlying(&self, id: &TypeIdentity) -> Option<TypeExpr> {
        let decl = self.lookup(id)?;
        let mut seen: HashSet<TypeIdentity> = HashSet::from([id.clone()]);
        let mut ty = decl.ty.clone();
        loop {
            let next = match &ty {
                TypeExpr::Named(r) => {
                    if !seen.insert(r.id.clone()) {
                        return None;
                    }
                    self.lookup(&r.id)?.instantiate(&r.args)
                }
                _ => return Some(ty),
            };
            ty = next;
        }
    }
}

/// Bind qualifiers the parser could not resolve: unnamed imports of
/// workspace packages whose real name is not the one guessed from the path.
fn requalify(unit: &mut SourceUnit, names: &HashMap<String, String>) {
    let mut rebind: HashMap<String, String> = HashMap::new();
    for import in unit.imports.iter().filter(|i| i.name.is_none()) {
        let Some(actual) = names.get(&import.path) else {
            continue;
        };
        // A bare qualifier equal to a real package path is already resolved.
        if actual != default_package_name(&import.path) && !names.contains_key(actual) {
            rebind.insert(actual.clone(), import.path.clone());
        }
    }
    if rebind.is_empty() {
        return;
    }
    for group in &mut unit.groups {
        for decl in &mut group.decls {
            decl.ty.requalify(&rebind);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Field, Import};

    const PKG: &str = "example.com/app";

    fn workspace() -> Workspace {
        let a = SourceUnit::new("a.go", PKG)
            .with_decl(TypeDecl::new(
                "Base",
                TypeExpr::struct_of(vec![Field::new("N", TypeExpr::basic("int"))]),
            ))
            .with_decl(TypeDecl::new("Derived", TypeExpr::named(PKG, "Base")))
            .with_decl(TypeDecl::alias("Link", TypeExpr::named(PKG, "Derived")));
        let b = SourceUnit::new("b.go", PKG)
            .with_decl(
                TypeDecl::new(
                    "Box",
                    TypeExpr::struct_of(vec![Field::new("V", TypeExpr::param("T"))]),
                )
                .with_params(["T"]),
            )
            .with_decl(TypeDecl::new(
                "IntBox",
                TypeExpr::instance(TypeIdentity::new(PKG, "Box"), vec![TypeExpr::basic("int")]),
            ))
            .with_decl(TypeDecl::new("Loop1", TypeExpr::named(PKG, "Loop2")))
            .with_decl(TypeDecl::new("Loop2", TypeExpr::named(PKG, "Loop1")))
            .with_decl(TypeDecl::new("Remote", TypeExpr::named("other/pkg", "Thing")));
        Workspace::new(vec![a, b])
    }

    #[test]
    fn test_units_get_positional_ids() {
        let ws = workspace();
        assert_eq!(ws.units()[1].id, UnitId(1));
        assert!(ws.has_package(PKG));
        assert_eq!(ws.packages().collect::<Vec<_>>(), vec![PKG]);
    }

    #[test]
    fn test_underlying_follows_defined_types() {
        let ws = workspace();
        let base = ws.underlying(&TypeIdentity::new(PKG, "Base")).unwrap();
        let derived = ws.underlying(&TypeIdentity::new(PKG, "Derived")).unwrap();
        assert_eq!(base, derived);
    }

    #[test]
    fn test_underlying_binds_generic_arguments() {
        let ws = workspace();
        let TypeExpr::Struct { fields } = ws.underlying(&TypeIdentity::new(PKG, "IntBox")).unwrap()
        else {
            panic!("IntBox should unwrap to a struct");
        };
        assert_eq!(fields[0].ty, TypeExpr::basic("int"));
    }

    #[test]
    fn test_underlying_stops_on_cycles_and_unknown_types() {
        let ws = workspace();
        assert!(ws.underlying(&TypeIdentity::new(PKG, "Loop1")).is_none());
        assert!(ws.underlying(&TypeIdentity::new(PKG, "Remote")).is_none());
    }

    #[test]
    fn test_requalifies_renamed_package_imports() {
        let mut money = SourceUnit::new("go-money/m.go", "example.com/app/go-money")
            .with_decl(TypeDecl::new("Amount", TypeExpr::struct_of(vec![])));
        money.package_name = "money".to_string();
        let order = SourceUnit::new("main.go", PKG)
            .with_import(Import::new("example.com/app/go-money"))
            .with_decl(TypeDecl::new(
                "Order",
                TypeExpr::struct_of(vec![
                    Field::new("Total", TypeExpr::pointer(TypeExpr::named("money", "Amount"))),
                    Field::new("At", TypeExpr::named("time", "Time")),
                ]),
            ));
        let ws = Workspace::new(vec![money, order]);

        assert_eq!(ws.package_name("example.com/app/go-money"), Some("money"));
        let order = ws.lookup(&TypeIdentity::new(PKG, "Order")).unwrap();
        let TypeExpr::Struct { fields } = &order.ty else {
            panic!("Order should be a struct");
        };
        let amount = TypeIdentity::new("example.com/app/go-money", "Amount");
        assert_eq!(fields[0].ty, TypeExpr::pointer(TypeExpr::Named(NamedRef::new(amount))));
        assert_eq!(fields[1].ty, TypeExpr::named("time", "Time"));
    }

    #[test]
    fn test_resolve_alias_only_for_aliases() {
        let ws = workspace();
        let link = NamedRef::new(TypeIdentity::new(PKG, "Link"));
        assert_eq!(ws.resolve_alias(&link), Some(TypeExpr::named(PKG, "Derived")));
        let base = NamedRef::new(TypeIdentity::new(PKG, "Base"));
        assert_eq!(ws.resolve_alias(&base), None);
    }
}
