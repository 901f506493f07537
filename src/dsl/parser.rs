//! Query parser.
//!
//! The grammar lives in `grammar.pest`; this module turns its parse tree
//! into a [`DslNode`], folding operator chains and dropping grouping.

use pest::error::{InputLocation, LineColLocation};
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use super::DslNode;

#[derive(Parser)]
#[grammar = "dsl/grammar.pest"]
struct QueryGrammar;

/// Query parse failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty query")]
    Empty,

    #[error("parse error at {line}:{col}: unknown input")]
    UnknownInput { line: usize, col: usize },

    #[error("parse error at {line}:{col}: {message}")]
    Syntax {
        line: usize,
        col: usize,
        message: String,
    },

    #[error("unexpected parse tree node: {0}")]
    Unexpected(String),
}

impl ParseError {
    fn from_grammar(err: pest::error::Error<Rule>) -> Self {
        let (line, col) = match err.line_col {
            LineColLocation::Pos(pos) => pos,
            LineColLocation::Span(start, _) => start,
        };
        let offset = match err.location {
            InputLocation::Pos(pos) => pos,
            InputLocation::Span((start, _)) => start,
        };

        if offset == 0 {
            Self::UnknownInput { line, col }
        } else {
            Self::Syntax {
                line,
                col,
                message: err.variant.message().into_owned(),
            }
        }
    }
}

/// Parse a query string into its syntax tree
pub fn parse(input: &str) -> Result<DslNode, ParseError> {
    if input.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let query = QueryGrammar::parse(Rule::query, input)
        .map_err(ParseError::from_grammar)?
        .next()
        .ok_or(ParseError::Empty)?;
    convert(query)
}

fn convert(pair: Pair<'_, Rule>) -> Result<DslNode, ParseError> {
    match pair.as_rule() {
        Rule::query | Rule::group => {
            let inner = pair
                .into_inner()
                .find(|p| p.as_rule() == Rule::pipeline)
                .ok_or_else(|| ParseError::Unexpected("missing pipeline".to_string()))?;
            convert(inner)
        }
        Rule::pipeline => {
            let mut stages = pair.into_inner().map(convert).collect::<Result<Vec<_>, _>>()?;
            if stages.len() == 1 {
                Ok(stages.remove(0))
            } else {
                Ok(DslNode::Pipeline(stages))
            }
        }
        Rule::or_expr => fold_binary(pair, "||"),
        Rule::and_expr => fold_binary(pair, "&&"),
        Rule::not_expr => {
            let mut inner = pair.into_inner();
            let first = next_pair(&mut inner)?;
            if first.as_rule() == Rule::not_op {
                let operand = convert(next_pair(&mut inner)?)?;
                Ok(DslNode::call("!", vec![operand]))
            } else {
                convert(first)
            }
        }
        Rule::comparison => {
            let mut inner = pair.into_inner();
            let left = convert(next_pair(&mut inner)?)?;
            match inner.next() {
                Some(op) => {
                    let right = convert(next_pair(&mut inner)?)?;
                    Ok(DslNode::call(op.as_str(), vec![left, right]))
                }
                None => Ok(left),
            }
        }
        Rule::membership => {
            let mut operands = pair.into_inner().filter(|p| p.as_rule() != Rule::has_kw);
            let field = convert(next_pair(&mut operands)?)?;
            let value = convert(next_pair(&mut operands)?)?;
            Ok(DslNode::call("has", vec![field, value]))
        }
        Rule::map_call => Ok(DslNode::Map(Box::new(convert_only_child(pair)?))),
        Rule::rmap_call => Ok(DslNode::RMap(Box::new(convert_only_child(pair)?))),
        Rule::filter_call => Ok(DslNode::Filter(Box::new(convert_only_child(pair)?))),
        Rule::rfilter_call => Ok(DslNode::RFilter(Box::new(convert_only_child(pair)?))),
        Rule::reduce_call => {
            let name = next_pair(&mut pair.into_inner())?.as_str().to_string();
            Ok(DslNode::Reduce(Box::new(DslNode::call(name, vec![]))))
        }
        Rule::field => Ok(DslNode::Field(
            pair.into_inner().map(|segment| segment.as_str().to_string()).collect(),
        )),
        Rule::string => {
            let text = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
            Ok(DslNode::literal(text))
        }
        Rule::number | Rule::boolean => Ok(DslNode::literal(pair.as_str())),
        other => Err(ParseError::Unexpected(format!("{:?}", other))),
    }
}

/// Left-fold `a op b op c` into `Call(op, Call(op, a, b), c)`
fn fold_binary(pair: Pair<'_, Rule>, op: &str) -> Result<DslNode, ParseError> {
    let mut operands = pair.into_inner();
    let mut acc = convert(next_pair(&mut operands)?)?;
    for operand in operands {
        acc = DslNode::call(op, vec![acc, convert(operand)?]);
    }
    Ok(acc)
}

fn convert_only_child(pair: Pair<'_, Rule>) -> Result<DslNode, ParseError> {
    convert(next_pair(&mut pair.into_inner())?)
}

fn next_pair<'i>(pairs: &mut impl Iterator<Item = Pair<'i, Rule>>) -> Result<Pair<'i, Rule>, ParseError> {
    pairs
        .next()
        .ok_or_else(|| ParseError::Unexpected("missing operand".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stringify(query: &str) -> String {
        parse(query).unwrap().to_string()
    }

    #[test]
    fn test_parse_corpus() {
        let cases = [
            ("map(.children)", "Map(Field(children))"),
            (
                "map(.children) |> filter(.type == \"FunctionDecl\")",
                "Pipeline(Map(Field(children)) | Filter(Call(==, Field(type), Literal(FunctionDecl))))",
            ),
            ("reduce(count)", "Reduce(Call(count))"),
            ("rmap(.token)", "RMap(Field(token))"),
            ("rfilter(.type == 'If')", "RFilter(Call(==, Field(type), Literal(If)))"),
            (".props.deep.nested.field", "Field(props.deep.nested.field)"),
            ("\"\"", "Literal()"),
            ("3.14", "Literal(3.14)"),
            ("-2", "Literal(-2)"),
            ("true", "Literal(true)"),
            (".a || .b || .c", "Call(||, Call(||, Field(a), Field(b)), Field(c))"),
            (
                ".a || .b && .c",
                "Call(||, Field(a), Call(&&, Field(b), Field(c)))",
            ),
            (
                "!.type == \"Function\"",
                "Call(!, Call(==, Field(type), Literal(Function)))",
            ),
            ("!(.type == \"A\")", "Call(!, Call(==, Field(type), Literal(A)))"),
            (".roles has \"Exported\"", "Call(has, Field(roles), Literal(Exported))"),
            (".line >= 10", "Call(>=, Field(line), Literal(10))"),
            (".name != \"\"", "Call(!=, Field(name), Literal())"),
        ];

        for (query, expected) in cases {
            assert_eq!(stringify(query), expected, "query: {}", query);
        }
    }

    #[test]
    fn test_whitespace_is_insignificant() {
        assert_eq!(
            stringify("  map( .children )\n|>\tfilter( .type==\"X\" )  "),
            stringify("map(.children) |> filter(.type == \"X\")")
        );
    }

    #[test]
    fn test_nested_pipelines() {
        assert_eq!(
            stringify("map(.children |> .token)"),
            "Map(Pipeline(Field(children) | Field(token)))"
        );
        assert_eq!(
            stringify("rfilter(.type == \"F\") |> map(.props.name) |> reduce(count)"),
            "Pipeline(RFilter(Call(==, Field(type), Literal(F))) | Map(Field(props.name)) | Reduce(Call(count)))"
        );
    }

    #[test]
    fn test_invalid_queries() {
        let cases = [
            "@#$",
            "function",
            ".",
            "..type",
            ".123",
            "\"unclosed",
            "'unclosed",
            "map()",
            "|>",
            "map(.children) |>",
            ".type = \"F\"",
            "123abc",
            "1.2.3",
            "filter(.type == )",
            "reduce()",
        ];

        for query in cases {
            assert!(parse(query).is_err(), "query should fail: {}", query);
        }
    }

    #[test]
    fn test_error_positions() {
        let err = parse("@#$").unwrap_err();
        assert_eq!(err, ParseError::UnknownInput { line: 1, col: 1 });
        assert_eq!(err.to_string(), "parse error at 1:1: unknown input");

        match parse("map(.children) |>").unwrap_err() {
            ParseError::Syntax { line, col, .. } => {
                assert_eq!(line, 1);
                assert!(col > 1);
            }
            other => panic!("expected syntax error, got {:?}", other),
        }

        assert_eq!(parse("   ").unwrap_err(), ParseError::Empty);
    }

    #[test]
    fn test_stringify_round_trip_is_stable() {
        for query in ["map(.children)", "reduce(count)", ".props.deep.nested.field", "3.14"] {
            let once = parse(query).unwrap();
            let twice = parse(query).unwrap();
            assert_eq!(once, twice);
            assert_eq!(once.to_string(), twice.to_string());
        }
    }
}
