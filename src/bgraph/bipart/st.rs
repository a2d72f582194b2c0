//! Strategy interpreter and method table for graph bipartitioning.

use super::{
    bd, df, ex, fm, gg, gp, ml, zr, BandParam, BgraphMethodParam, BgraphStrat, BgraphStratTab,
    DiffusionParam, FmParam, GpsParam, GreedyGrowParam, MlParam,
};
use crate::bgraph::{Bgraph, BgraphStat, BgraphStore};
use crate::bipart_error::BipartError;
use crate::config::BipartContext;
use crate::debug_invariants::DebugInvariants;
use crate::graph::coarsen::MatchType;
use crate::strategy::{parser, ParamKind, ParamValue, Strat, TestValue};
use once_cell::sync::Lazy;
use std::sync::Arc;

/// Strategy used when the caller does not provide one.
pub const DEFAULT_STRATEGY: &str = "m{vert=100,rat=0.8,type=h,\
low=h{pass=10}f{bal=0.05,move=120},\
asc=b{width=3,bnd=f{bal=0.05,move=120},org=f{bal=0.05,move=120}}}";

static DEFAULT_TAB: Lazy<Arc<BgraphStratTab>> = Lazy::new(|| Arc::new(bgraph_strat_tab()));

/// Process-wide method table.
pub fn default_tab() -> Arc<BgraphStratTab> {
    Arc::clone(&DEFAULT_TAB)
}

/// Parse [`DEFAULT_STRATEGY`] against the default table.
pub fn default_strat() -> Result<Arc<BgraphStrat>, BipartError> {
    parser::parse(DEFAULT_STRATEGY, &DEFAULT_TAB)
}

macro_rules! setter {
    ($variant:ident, $field:ident, Int) => {
        |p: &mut BgraphMethodParam, v: ParamValue<BgraphMethodParam>| match (p, v) {
            (BgraphMethodParam::$variant(r), ParamValue::Int(i)) => {
                r.$field = i;
                Ok(())
            }
            _ => Err(BgraphMethodParam::mismatch(stringify!($field))),
        }
    };
    ($variant:ident, $field:ident, Double) => {
        |p: &mut BgraphMethodParam, v: ParamValue<BgraphMethodParam>| match (p, v) {
            (BgraphMethodParam::$variant(r), ParamValue::Double(d)) => {
                r.$field = d;
                Ok(())
            }
            _ => Err(BgraphMethodParam::mismatch(stringify!($field))),
        }
    };
    ($variant:ident, $field:ident, Strat) => {
        |p: &mut BgraphMethodParam, v: ParamValue<BgraphMethodParam>| match (p, v) {
            (BgraphMethodParam::$variant(r), ParamValue::Strat(s)) => {
                r.$field = s;
                Ok(())
            }
            _ => Err(BgraphMethodParam::mismatch(stringify!($field))),
        }
    };
}

/// Build a fresh bipartitioning method table.
pub fn bgraph_strat_tab() -> BgraphStratTab {
    let mut tab = BgraphStratTab::new(BgraphStat::ALL.iter().map(|s| s.name()).collect());

    let b = tab.add_method("b", bd::bipart_bd, BgraphMethodParam::Band(BandParam::default()));
    tab.add_param(b, "bnd", ParamKind::Strat, setter!(Band, bnd, Strat));
    tab.add_param(b, "org", ParamKind::Strat, setter!(Band, org, Strat));
    tab.add_param(b, "width", ParamKind::Int, setter!(Band, distmax, Int));

    let d = tab.add_method(
        "d",
        df::bipart_df,
        BgraphMethodParam::Diffusion(DiffusionParam::default()),
    );
    tab.add_param(d, "pass", ParamKind::Int, setter!(Diffusion, passnbr, Int));
    tab.add_param(d, "dif", ParamKind::Double, setter!(Diffusion, cdifval, Double));
    tab.add_param(d, "rem", ParamKind::Double, setter!(Diffusion, cremval, Double));

    tab.add_method("x", ex::bipart_ex, BgraphMethodParam::Exact);

    let f = tab.add_method("f", fm::bipart_fm, BgraphMethodParam::Fm(FmParam::default()));
    tab.add_param(f, "move", ParamKind::Int, setter!(Fm, movenbr, Int));
    tab.add_param(f, "pass", ParamKind::Int, setter!(Fm, passnbr, Int));
    tab.add_param(f, "bal", ParamKind::Double, setter!(Fm, deltrat, Double));

    let h = tab.add_method(
        "h",
        gg::bipart_gg,
        BgraphMethodParam::GreedyGrow(GreedyGrowParam::default()),
    );
    tab.add_param(h, "pass", ParamKind::Int, setter!(GreedyGrow, passnbr, Int));

    let g = tab.add_method("g", gp::bipart_gp, BgraphMethodParam::Gps(GpsParam::default()));
    tab.add_param(g, "pass", ParamKind::Int, setter!(Gps, passnbr, Int));

    let m = tab.add_method("m", ml::bipart_ml, BgraphMethodParam::Ml(MlParam::default()));
    tab.add_param(m, "asc", ParamKind::Strat, setter!(Ml, asc, Strat));
    tab.add_param(m, "low", ParamKind::Strat, setter!(Ml, low, Strat));
    tab.add_param(m, "type", ParamKind::Case("hscd"), |p, v| match (p, v) {
        (BgraphMethodParam::Ml(r), ParamValue::Case(c)) => {
            r.matchtype = MatchType::from_char(c)
                .ok_or_else(|| BipartError::InvalidParameter(format!("unknown matching type '{c}'")))?;
            Ok(())
        }
        _ => Err(BgraphMethodParam::mismatch("type")),
    });
    tab.add_param(m, "vert", ParamKind::Int, setter!(Ml, coarnbr, Int));
    tab.add_param(m, "rat", ParamKind::Double, setter!(Ml, coarrat, Double));

    tab.add_method("z", zr::bipart_zr, BgraphMethodParam::Zero);
    tab
}

/// Apply strategy `strat` to `graph`.
///
/// On return the graph holds a consistent bipartition, whatever the outcome.
pub fn bipart_st(
    graph: &mut Bgraph<'_>,
    strat: &BgraphStrat,
    ctx: &mut BipartContext,
) -> Result<(), BipartError> {
    if !graph.is_allocated() {
        graph.alloc()?;
        graph.zero();
    }
    match strat {
        Strat::Empty => Ok(()),
        Strat::Concat(items) => {
            for item in items {
                bipart_st(graph, item, ctx)?;
            }
            Ok(())
        }
        Strat::Cond { test, then, els } => {
            let vars = |i: usize| BgraphStat::ALL.get(i).map(|&s| TestValue::Int(graph.stat(s)));
            if test.eval_bool(&vars)? {
                bipart_st(graph, then, ctx)
            } else if let Some(els) = els {
                bipart_st(graph, els, ctx)
            } else {
                Ok(())
            }
        }
        Strat::Select(branches) => select(graph, branches, ctx),
        Strat::Method { meth, name, data } => {
            let tab = Arc::clone(ctx.tab());
            let entry = tab
                .method(*meth)
                .filter(|m| m.name == *name)
                .ok_or_else(|| {
                    BipartError::InvalidParameter(format!(
                        "method '{name}' (#{meth}) is not in the context's method table"
                    ))
                })?;
            log::trace!(
                "applying method '{name}' on {} vertices at level {}",
                graph.graph().vertnbr(),
                graph.levlnum()
            );
            let out = (entry.func)(graph, data, ctx);
            if out.is_ok() {
                graph.debug_assert_invariants();
            }
            out
        }
    }
}

/// Run every branch from the state `graph` holds on entry and keep the best
/// result. Branches are folded left to right: a successful result beats a
/// failed one, a lower communication load wins, then a smaller imbalance,
/// and the later branch wins ties.
fn select(
    graph: &mut Bgraph<'_>,
    branches: &[Arc<BgraphStrat>],
    ctx: &mut BipartContext,
) -> Result<(), BipartError> {
    let Some((first, rest)) = branches.split_first() else {
        return Ok(());
    };
    let vertnbr = graph.graph().vertnbr();
    let mut initial = BgraphStore::new(vertnbr)?;
    let mut best = BgraphStore::new(vertnbr)?;

    initial.save(graph);
    let mut outcome = bipart_st(graph, first, ctx);
    for branch in rest {
        best.save(graph);
        initial.update(graph)?;
        let next = bipart_st(graph, branch, ctx);

        let keep_best = match (&outcome, &next) {
            (Ok(()), Err(_)) => true,
            (Ok(()), Ok(())) => {
                best.commload() < graph.commload()
                    || (best.commload() == graph.commload()
                        && best.compload0dlt().abs() < graph.compload0dlt().abs())
            }
            _ => false,
        };
        if keep_best {
            best.update(graph)?;
        }
        outcome = match (outcome, next) {
            (Err(e1), Err(e2)) => Err(e1.worst(e2)),
            _ => Ok(()),
        };
    }
    outcome
}
