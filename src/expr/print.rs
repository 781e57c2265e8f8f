use std::{collections::HashMap, fmt::Write};

use super::{ExprGraph, ExprId, Node};

/// Matrix entries written in terms of shared temporaries.
pub struct CseListing {
    /// `(name, definition)` in evaluation order.
    pub temporaries: Vec<(String, String)>,
    pub outputs: Vec<String>,
}

impl ExprGraph {
    /// Renders an expression inline, without sharing.
    pub fn display(&self, e: ExprId) -> String {
        self.render(e, &HashMap::new())
    }

    fn render(&self, e: ExprId, names: &HashMap<ExprId, String>) -> String {
        if let Some(name) = names.get(&e) {
            return name.clone();
        }
        match self.node(e) {
            Node::Const(c) => format_float(c.0),
            Node::Symbol(s) => self.symbol_name(*s).to_string(),
            Node::Add(terms) => {
                let mut out = String::new();
                for (i, t) in terms.iter().enumerate() {
                    let text = self.render(*t, names);
                    match (i, text.strip_prefix('-')) {
                        (0, _) => out.push_str(&text),
                        (_, Some(rest)) => {
                            let _ = write!(out, " - {}", rest);
                        }
                        (_, None) => {
                            let _ = write!(out, " + {}", text);
                        }
                    }
                }
                format!("({})", out)
            }
            Node::Mul(factors) => {
                let mut parts: Vec<String> =
                    factors.iter().map(|f| self.render(*f, names)).collect();
                if parts.len() > 1 && parts[0] == "-1" {
                    parts.remove(0);
                    format!("-{}", parts.join("*"))
                } else {
                    parts.join("*")
                }
            }
            Node::Pow(base, exponent) => {
                format!("{}**{}", self.render(*base, names), format_float(exponent.0))
            }
            Node::Sin(arg) => format!("sin({})", self.render_argument(*arg, names)),
            Node::Cos(arg) => format!("cos({})", self.render_argument(*arg, names)),
        }
    }

    /// Function arguments drop the parentheses of a bare sum.
    fn render_argument(&self, e: ExprId, names: &HashMap<ExprId, String>) -> String {
        let text = self.render(e, names);
        match (self.node(e), names.contains_key(&e)) {
            (Node::Add(_), false) => text[1..text.len() - 1].to_string(),
            _ => text,
        }
    }

    /// Common-subexpression listing of `roots`: every composite node used
    /// more than once becomes a temporary.
    pub fn cse(&self, roots: &[ExprId]) -> CseListing {
        let order = self.reachable(roots);
        let mut uses: HashMap<ExprId, usize> = HashMap::new();
        for e in &order {
            match self.node(*e) {
                Node::Add(args) | Node::Mul(args) => {
                    for a in args.iter() {
                        *uses.entry(*a).or_insert(0) += 1;
                    }
                }
                Node::Pow(b, _) | Node::Sin(b) | Node::Cos(b) => {
                    *uses.entry(*b).or_insert(0) += 1;
                }
                Node::Const(_) | Node::Symbol(_) => {}
            }
        }

        let mut names = HashMap::new();
        let mut temporaries = vec![];
        for e in order {
            let composite = !matches!(self.node(e), Node::Const(_) | Node::Symbol(_));
            if composite && uses.get(&e).copied().unwrap_or(0) > 1 {
                let definition = self.render(e, &names);
                let name = format!("x{}", temporaries.len());
                temporaries.push((name.clone(), definition));
                names.insert(e, name);
            }
        }
        let outputs = roots.iter().map(|r| self.render(*r, &names)).collect();
        CseListing {
            temporaries,
            outputs,
        }
    }
}

fn format_float(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:?}", value)
    }
}
