//! Strict provider: tokenizer plus recursive-descent parser.
//!
//! Unlike the lexical scanner this variant rejects anything it does not
//! understand, reports the offending line, and resolves nested-package
//! scoping and subtype constraints from an actual parse rather than from
//! line patterns. The produced graph shape is identical for well-formed
//! input.

use crate::error::GenError;
use crate::schema::{
    Dim, FieldDecl, NumericRepr, PrimitiveTy, RangeConstraint, Side, TypeDecl, TypeGraph, TypeKind,
    TypeRef,
};

use super::SchemaParser;

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Num(f64),
    LParen,
    RParen,
    Comma,
    Semi,
    Colon,
    Dot,
    DotDot,
    Minus,
    Plus,
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    line: usize,
}

fn lex(side: Side, source: &str) -> Result<Vec<Token>, GenError> {
    let mut toks = Vec::new();
    let mut line = 1usize;
    let mut chars = source.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            '\n' => {
                line += 1;
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '-' => {
                chars.next();
                if chars.peek() == Some(&'-') {
                    // comment to end of line
                    for c in chars.by_ref() {
                        if c == '\n' {
                            line += 1;
                            break;
                        }
                    }
                } else {
                    toks.push(Token { tok: Tok::Minus, line });
                }
            }
            '+' => {
                chars.next();
                toks.push(Token { tok: Tok::Plus, line });
            }
            '.' => {
                chars.next();
                if chars.peek() == Some(&'.') {
                    chars.next();
                    toks.push(Token { tok: Tok::DotDot, line });
                } else {
                    toks.push(Token { tok: Tok::Dot, line });
                }
            }
            '(' => {
                chars.next();
                toks.push(Token { tok: Tok::LParen, line });
            }
            ')' => {
                chars.next();
                toks.push(Token { tok: Tok::RParen, line });
            }
            ',' => {
                chars.next();
                toks.push(Token { tok: Tok::Comma, line });
            }
            ';' => {
                chars.next();
                toks.push(Token { tok: Tok::Semi, line });
            }
            ':' => {
                chars.next();
                toks.push(Token { tok: Tok::Colon, line });
            }
            c if c.is_ascii_alphabetic() => {
                let mut s = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        s.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                toks.push(Token { tok: Tok::Ident(s), line });
            }
            c if c.is_ascii_digit() => {
                let mut s = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() || c == '_' || c == 'e' || c == 'E' {
                        s.push(c);
                        chars.next();
                    } else if c == '.' {
                        // lookahead: ".." terminates the number
                        let mut probe = chars.clone();
                        probe.next();
                        if probe.peek() == Some(&'.') {
                            break;
                        }
                        s.push(c);
                        chars.next();
                    } else if (c == '-' || c == '+')
                        && s.chars().last().is_some_and(|l| l == 'e' || l == 'E')
                    {
                        s.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let v: f64 = s.replace('_', "").parse().map_err(|_| GenError::Parse {
                    side,
                    detail: format!("line {line}: malformed numeric literal '{s}'"),
                })?;
                toks.push(Token { tok: Tok::Num(v), line });
            }
            other => {
                return Err(GenError::Parse {
                    side,
                    detail: format!("line {line}: unexpected character '{other}'"),
                });
            }
        }
    }
    Ok(toks)
}

struct Parser {
    side: Side,
    toks: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn err(&self, msg: impl Into<String>) -> GenError {
        let line = self
            .toks
            .get(self.pos.min(self.toks.len().saturating_sub(1)))
            .map(|t| t.line)
            .unwrap_or(0);
        GenError::Parse {
            side: self.side,
            detail: format!("line {line}: {}", msg.into()),
        }
    }

    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos).map(|t| &t.tok)
    }

    fn next(&mut self) -> Option<Tok> {
        let t = self.toks.get(self.pos).map(|t| t.tok.clone());
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, want: Tok, what: &str) -> Result<(), GenError> {
        match self.next() {
            Some(t) if t == want => Ok(()),
            _ => Err(self.err(format!("expected {what}"))),
        }
    }

    fn ident(&mut self, what: &str) -> Result<String, GenError> {
        match self.next() {
            Some(Tok::Ident(s)) => Ok(s),
            _ => Err(self.err(format!("expected {what}"))),
        }
    }

    fn keyword(&mut self, kw: &str) -> Result<(), GenError> {
        match self.next() {
            Some(Tok::Ident(s)) if s.eq_ignore_ascii_case(kw) => Ok(()),
            _ => Err(self.err(format!("expected '{kw}'"))),
        }
    }

    fn at_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(Tok::Ident(s)) if s.eq_ignore_ascii_case(kw))
    }

    /// Dotted name ("Geo.Pos").
    fn dotted(&mut self, what: &str) -> Result<String, GenError> {
        let mut name = self.ident(what)?;
        while self.peek() == Some(&Tok::Dot) {
            self.next();
            name.push('.');
            name.push_str(&self.ident("identifier after '.'")?);
        }
        Ok(name)
    }

    /// Signed numeric literal.
    fn number(&mut self, what: &str) -> Result<f64, GenError> {
        let sign = match self.peek() {
            Some(Tok::Minus) => {
                self.next();
                -1.0
            }
            Some(Tok::Plus) => {
                self.next();
                1.0
            }
            _ => 1.0,
        };
        match self.next() {
            Some(Tok::Num(v)) => Ok(sign * v),
            _ => Err(self.err(format!("expected {what}"))),
        }
    }

    fn range(&mut self) -> Result<RangeConstraint, GenError> {
        let lo = self.number("range lower bound")?;
        self.expect(Tok::DotDot, "'..'")?;
        let hi = self.number("range upper bound")?;
        Ok(RangeConstraint::new(lo, hi))
    }

    fn package(&mut self, graph: &mut TypeGraph, scope: &mut Vec<String>) -> Result<(), GenError> {
        self.keyword("package")?;
        let name = self.ident("package name")?;
        self.keyword("is")?;
        let is_root = graph.package.is_empty();
        if is_root {
            graph.set_package(name.clone());
        } else {
            scope.push(name.clone());
        }

        loop {
            if self.at_keyword("end") {
                break;
            }
            if self.at_keyword("package") {
                self.package(graph, scope)?;
            } else if self.at_keyword("type") {
                self.type_decl(graph, scope)?;
            } else if self.at_keyword("subtype") {
                self.subtype_decl(graph, scope)?;
            } else {
                return Err(self.err("expected 'type', 'subtype', 'package' or 'end'"));
            }
        }

        self.keyword("end")?;
        if matches!(self.peek(), Some(Tok::Ident(_))) {
            let closer = self.dotted("package name after 'end'")?;
            let simple = closer.rsplit('.').next().unwrap_or(&closer);
            if !simple.eq_ignore_ascii_case(&name) {
                return Err(self.err(format!("'end {closer};' does not close package '{name}'")));
            }
        }
        self.expect(Tok::Semi, "';'")?;
        if !is_root {
            scope.pop();
        }
        Ok(())
    }

    fn subtype_decl(&mut self, graph: &mut TypeGraph, scope: &[String]) -> Result<(), GenError> {
        self.keyword("subtype")?;
        let name = self.ident("subtype name")?;
        self.keyword("is")?;
        let base = self.dotted("base type mark")?;
        let range = if self.at_keyword("range") {
            self.next();
            Some(self.range()?)
        } else {
            None
        };
        self.expect(Tok::Semi, "';'")?;
        graph.add(TypeDecl {
            name,
            scope: scope.to_vec(),
            kind: TypeKind::Subtype { base: TypeRef::new(base), range },
        })
    }

    fn type_decl(&mut self, graph: &mut TypeGraph, scope: &[String]) -> Result<(), GenError> {
        self.keyword("type")?;
        let name = self.ident("type name")?;
        self.keyword("is")?;

        let kind = if self.at_keyword("range") {
            self.next();
            let range = self.range()?;
            self.expect(Tok::Semi, "';'")?;
            TypeKind::Primitive(PrimitiveTy { repr: NumericRepr::Integer, range })
        } else if self.at_keyword("digits") {
            self.next();
            let digits = self.number("digits count")? as u32;
            let range = if self.at_keyword("range") {
                self.next();
                self.range()?
            } else {
                RangeConstraint::new(f64::MIN, f64::MAX)
            };
            self.expect(Tok::Semi, "';'")?;
            TypeKind::Primitive(PrimitiveTy { repr: NumericRepr::Float { digits }, range })
        } else if self.at_keyword("delta") {
            self.next();
            let delta = self.number("delta step")?;
            self.keyword("range")?;
            let range = self.range()?;
            self.expect(Tok::Semi, "';'")?;
            TypeKind::Primitive(PrimitiveTy {
                repr: NumericRepr::Fixed { delta: delta.into() },
                range,
            })
        } else if self.at_keyword("record") {
            self.next();
            let mut fields = Vec::new();
            while !self.at_keyword("end") {
                let fname = self.ident("field name")?;
                self.expect(Tok::Colon, "':'")?;
                let mark = self.dotted("field type mark")?;
                self.expect(Tok::Semi, "';'")?;
                fields.push(FieldDecl { name: fname, ty: TypeRef::new(mark) });
            }
            self.keyword("end")?;
            self.keyword("record")?;
            self.expect(Tok::Semi, "';'")?;
            TypeKind::Record { fields }
        } else if self.at_keyword("array") {
            self.next();
            self.expect(Tok::LParen, "'('")?;
            let mut dims = Vec::new();
            loop {
                let dim = match self.peek() {
                    Some(Tok::Ident(_)) => Dim::Named(TypeRef::new(self.dotted("index type")?)),
                    _ => {
                        let lo = self.number("dimension lower bound")?;
                        self.expect(Tok::DotDot, "'..'")?;
                        let hi = self.number("dimension upper bound")?;
                        Dim::Range(lo as i64, hi as i64)
                    }
                };
                dims.push(dim);
                match self.next() {
                    Some(Tok::Comma) => continue,
                    Some(Tok::RParen) => break,
                    _ => return Err(self.err("expected ',' or ')' in array dimensions")),
                }
            }
            self.keyword("of")?;
            let elem = self.dotted("element type mark")?;
            self.expect(Tok::Semi, "';'")?;
            TypeKind::Array { elem: TypeRef::new(elem), dims }
        } else if self.peek() == Some(&Tok::LParen) {
            self.next();
            let mut literals = vec![self.ident("enumeration literal")?];
            loop {
                match self.next() {
                    Some(Tok::Comma) => literals.push(self.ident("enumeration literal")?),
                    Some(Tok::RParen) => break,
                    _ => return Err(self.err("expected ',' or ')' in enumeration")),
                }
            }
            self.expect(Tok::Semi, "';'")?;
            TypeKind::Enum { literals }
        } else {
            return Err(self.err(format!("unsupported type definition for '{name}'")));
        };

        graph.add(TypeDecl { name, scope: scope.to_vec(), kind })
    }
}

pub struct SyntaxParser;

impl SchemaParser for SyntaxParser {
    fn parse(&self, side: Side, source: &str) -> Result<TypeGraph, GenError> {
        let toks = lex(side, source)?;
        let mut p = Parser { side, toks, pos: 0 };
        let mut graph = TypeGraph::new(side);
        let mut scope = Vec::new();
        p.package(&mut graph, &mut scope)?;
        if p.peek().is_some() {
            return Err(p.err("trailing input after root package"));
        }
        Ok(graph)
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> TypeGraph {
        let g = SyntaxParser.parse(Side::To, src).unwrap();
        g.link().unwrap();
        g
    }

    #[test]
    fn nested_scopes_and_qualified_refs() {
        let g = parse(
            "package Types_To is\n\
             \x20  package Geo is\n\
             \x20     type Lat is digits 6 range -90.0 .. 90.0;\n\
             \x20     type Pos is record\n\
             \x20        L : Lat;   -- innermost resolution\n\
             \x20     end record;\n\
             \x20  end Geo;\n\
             \x20  type Track is record\n\
             \x20     P : Geo.Pos;\n\
             \x20  end record;\n\
             end Types_To;",
        );
        assert_eq!(g.record_fields("geo.pos").unwrap()[0].ty.target(), "geo.lat");
        assert_eq!(g.record_fields("track").unwrap()[0].ty.target(), "geo.pos");
    }

    #[test]
    fn subtype_constraint_inheritance_is_precise() {
        let g = parse(
            "package Types_To is\n\
             \x20  type I32 is range -2_147_483_648 .. 2_147_483_647;\n\
             \x20  subtype Tiny is I32 range -3 .. 3;\n\
             \x20  subtype Alias is Tiny;\n\
             end Types_To;",
        );
        let p = g.primitive_of("alias").unwrap();
        assert_eq!(p.range, RangeConstraint::new(-3.0, 3.0));
    }

    #[test]
    fn reports_offending_line_on_malformed_input() {
        let err = SyntaxParser
            .parse(Side::To, "package P is\n   type X is wibble;\nend P;")
            .unwrap_err();
        match err {
            GenError::Parse { detail, .. } => assert!(detail.contains("line 2"), "{detail}"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn mismatched_end_name_is_rejected() {
        let err = SyntaxParser
            .parse(Side::To, "package P is\n   type X is range 0 .. 1;\nend Q;")
            .unwrap_err();
        assert!(matches!(err, GenError::Parse { .. }));
    }

    #[test]
    fn negative_float_bounds_parse() {
        let g = parse(
            "package P is\n   type Lon is digits 6 range -180.0 .. 180.0;\nend P;",
        );
        let p = g.primitive_of("lon").unwrap();
        assert_eq!(p.range, RangeConstraint::new(-180.0, 180.0));
    }
}
