//! Receiver-type id assignment and the method table.
//!
//! Methods were attached to their named types during resolution, in source
//! order within each package; packages were processed in compile order. Here
//! every named type with a non-empty method set receives a sequential
//! receiver-type id starting from 1, and the program root records the
//! ordered `(short name, symbol)` list per id. That ordering is visible in
//! the emitted `receiverTypes` table.

use crate::ir::{MethodTableEntry, Program};
use crate::types::GtypeKind;

pub fn assign_receiver_ids(prog: &mut Program) {
    let mut next = 1u32;
    let ids: Vec<_> = prog.types.ids().collect();
    for tid in ids {
        let g = prog.types.get(tid);
        if !matches!(g.kind, GtypeKind::Named { .. }) || g.methods.is_empty() {
            continue;
        }
        let entries: Vec<MethodTableEntry> = g
            .methods
            .iter()
            .map(|(name, fid)| MethodTableEntry {
                mname: name.clone(),
                symbol: prog.funcs[fid.0 as usize].symbol.clone(),
            })
            .collect();
        prog.types.get_mut(tid).receiver_type_id = next;
        prog.method_table.push((next, entries));
        next += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::Span;
    use crate::ir::{DeclFunc, Program};
    use crate::types::GtypeKind;

    fn dummy_func(prog: &mut Program, symbol: &str) -> crate::ir::FuncId {
        prog.add_func(DeclFunc {
            pkg: "main".into(),
            name: symbol.rsplit('$').next().unwrap().to_string(),
            symbol: symbol.to_string(),
            receiver: None,
            params: Vec::new(),
            variadic: false,
            rettypes: Vec::new(),
            localvars: Vec::new(),
            body: Vec::new(),
            builtin: None,
            is_extern: false,
            span: Span::zero(),
        })
    }

    #[test]
    fn ids_are_sequential_and_unique() {
        let mut prog = Program::default();
        let ti = prog.types.t_int;
        let a = prog.types.alloc(GtypeKind::Named {
            pkg: "main".into(),
            name: "A".into(),
            underlying: ti,
        });
        let b = prog.types.alloc(GtypeKind::Named {
            pkg: "main".into(),
            name: "B".into(),
            underlying: ti,
        });
        let plain = prog.types.alloc(GtypeKind::Named {
            pkg: "main".into(),
            name: "NoMethods".into(),
            underlying: ti,
        });
        let fa = dummy_func(&mut prog, "main.A$Name");
        let fb = dummy_func(&mut prog, "main.B$Name");
        prog.types.get_mut(a).methods.push(("Name".into(), fa));
        prog.types.get_mut(b).methods.push(("Name".into(), fb));

        assign_receiver_ids(&mut prog);

        assert_eq!(prog.types.get(a).receiver_type_id, 1);
        assert_eq!(prog.types.get(b).receiver_type_id, 2);
        assert_eq!(prog.types.get(plain).receiver_type_id, 0);
        assert_eq!(prog.method_table.len(), 2);
        assert_eq!(prog.method_table[0].1[0].symbol, "main.A$Name");
    }
}
