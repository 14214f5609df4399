//! Clause tree and text rendering.

use crate::predicate::Predicate;

/// One statement clause, or a nested subquery
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Line(String),
    /// `CALL { ... }`
    Call(Vec<Clause>),
    /// Branches joined by `UNION`
    Union(Vec<Vec<Clause>>),
}

const WRITE_KEYWORDS: [&str; 6] = ["CREATE", "SET", "MERGE", "DELETE", "DETACH", "REMOVE"];

fn is_write(clause: &Clause) -> bool {
    match clause {
        Clause::Line(text) => {
            let first = text.split_whitespace().next().unwrap_or_default();
            WRITE_KEYWORDS.contains(&first) || text.starts_with("ON CREATE SET")
        }
        Clause::Call(_) | Clause::Union(_) => false,
    }
}

/// Ordered clause builder
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Block {
    clauses: Vec<Clause>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, text: impl Into<String>) -> &mut Self {
        self.clauses.push(Clause::Line(text.into()));
        self
    }

    /// Append a subquery; a write clause right before it gets `WITH *`
    pub fn call(&mut self, body: Block) -> &mut Self {
        self.push(Clause::Call(body.clauses))
    }

    pub fn union(&mut self, branches: Vec<Block>) -> &mut Self {
        self.clauses.push(Clause::Union(
            branches.into_iter().map(|b| b.clauses).collect(),
        ));
        self
    }

    pub fn push(&mut self, clause: Clause) -> &mut Self {
        if matches!(clause, Clause::Call(_)) && self.clauses.last().is_some_and(is_write) {
            self.clauses.push(Clause::Line("WITH *".to_string()));
        }
        self.clauses.push(clause);
        self
    }

    pub fn extend(&mut self, clauses: impl IntoIterator<Item = Clause>) -> &mut Self {
        for clause in clauses {
            self.push(clause);
        }
        self
    }

    /// `WHERE` for the immediately preceding `MATCH`
    pub fn where_clause(&mut self, predicate: Option<&Predicate>) -> &mut Self {
        if let Some(p) = predicate {
            self.line(format!("WHERE {}", p));
        }
        self
    }

    /// Abort the statement unless `predicate` holds
    pub fn guard(&mut self, predicate: &Predicate, message: &str) -> &mut Self {
        self.line("WITH *");
        self.line(format!(
            "CALL apoc.util.validate(NOT ({}), {}, [0])",
            predicate,
            quote(message)
        ))
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn into_clauses(self) -> Vec<Clause> {
        self.clauses
    }

    pub fn render(&self, indent: usize) -> String {
        render(&self.clauses, indent)
    }
}

impl From<Vec<Clause>> for Block {
    fn from(clauses: Vec<Clause>) -> Self {
        Self { clauses }
    }
}

/// Double-quoted string literal for schema-derived text
pub fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Multi-line rendering, nested subqueries indented by `indent` spaces
pub fn render(clauses: &[Clause], indent: usize) -> String {
    let mut lines = Vec::new();
    render_into(&mut lines, clauses, 0, indent);
    lines.join("\n")
}

fn render_into(lines: &mut Vec<String>, clauses: &[Clause], depth: usize, indent: usize) {
    let pad = " ".repeat(depth * indent);
    for clause in clauses {
        match clause {
            Clause::Line(text) => {
                for part in text.lines() {
                    lines.push(format!("{}{}", pad, part));
                }
            }
            Clause::Call(body) => {
                lines.push(format!("{}CALL {{", pad));
                render_into(lines, body, depth + 1, indent);
                lines.push(format!("{}}}", pad));
            }
            Clause::Union(branches) => {
                for (i, branch) in branches.iter().enumerate() {
                    if i > 0 {
                        lines.push(format!("{}UNION", pad));
                    }
                    render_into(lines, branch, depth, indent);
                }
            }
        }
    }
}

/// Single-line rendering, used inside `EXISTS { ... }`
pub fn render_inline(clauses: &[Clause]) -> String {
    clauses
        .iter()
        .map(|clause| match clause {
            Clause::Line(text) => text.lines().map(str::trim).collect::<Vec<_>>().join(" "),
            Clause::Call(body) => format!("CALL {{ {} }}", render_inline(body)),
            Clause::Union(branches) => branches
                .iter()
                .map(|b| render_inline(b))
                .collect::<Vec<_>>()
                .join(" UNION "),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_nested_call() {
        let mut inner = Block::new();
        inner.line("WITH this").line("RETURN 1 AS var0");
        let mut block = Block::new();
        block.line("MATCH (this:Movie)").call(inner).line("RETURN this");

        assert_eq!(
            block.render(4),
            "MATCH (this:Movie)\nCALL {\n    WITH this\n    RETURN 1 AS var0\n}\nRETURN this"
        );
    }

    #[test]
    fn test_call_after_write_gets_with() {
        let mut block = Block::new();
        block.line("SET this.title = $param0").call(Block::new());
        assert_eq!(block.clauses()[1], Clause::Line("WITH *".to_string()));
    }

    #[test]
    fn test_call_after_read_has_no_with() {
        let mut block = Block::new();
        block.line("MATCH (this:Movie)").call(Block::new());
        assert!(matches!(block.clauses()[1], Clause::Call(_)));
    }

    #[test]
    fn test_render_union() {
        let mut a = Block::new();
        a.line("RETURN 1 AS x");
        let mut b = Block::new();
        b.line("RETURN 2 AS x");
        let mut block = Block::new();
        block.union(vec![a, b]);
        assert_eq!(block.render(2), "RETURN 1 AS x\nUNION\nRETURN 2 AS x");
    }

    #[test]
    fn test_render_inline() {
        let mut inner = Block::new();
        inner.line("WITH this0").line("RETURN count(*) AS var1");
        let mut block = Block::new();
        block.line("MATCH (this0)").call(inner);
        assert_eq!(
            render_inline(block.clauses()),
            "MATCH (this0) CALL { WITH this0 RETURN count(*) AS var1 }"
        );
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote(r#"a"b"#), r#""a\"b""#);
    }
}
