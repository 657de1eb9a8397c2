//! Calculator tool — evaluates mathematical expressions.
//!
//! Supports `+`, `-`, `*`, `/`, `%`, parentheses, and unary negation.
//! Uses precedence climbing over a token stream. No dependencies beyond std.

use async_trait::async_trait;
use murmur_core::error::ToolError;
use murmur_core::tool::{Tool, ToolOutput};

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate a mathematical expression. Supports +, -, *, /, % (remainder), \
         parentheses, and decimal numbers."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "The expression to evaluate, e.g. '(2 + 3) * 4'"
                }
            },
            "required": ["expression"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let expr = arguments["expression"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("missing 'expression' argument".into()))?;

        let value = evaluate(expr).map_err(|reason| ToolError::ExecutionFailed {
            tool_name: "calculator".into(),
            reason,
        })?;

        // Render integers without the trailing .0
        let rendered = if value.fract() == 0.0 && value.abs() < 1e15 {
            format!("{}", value as i64)
        } else {
            format!("{value}")
        };

        Ok(ToolOutput::json(serde_json::json!({
            "expression": expr,
            "result": rendered,
        })))
    }
}

/// Evaluate a mathematical expression string.
pub fn evaluate(expr: &str) -> Result<f64, String> {
    let mut eval = Eval {
        tokens: lex(expr)?,
        pos: 0,
    };
    let value = eval.expression(0)?;
    match eval.peek() {
        None => Ok(value),
        Some(t) => Err(format!("unexpected trailing token: {t:?}")),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Tok {
    Num(f64),
    Op(char),
    Open,
    Close,
}

fn lex(input: &str) -> Result<Vec<Tok>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '+' | '-' | '*' | '/' | '%' => {
                tokens.push(Tok::Op(c));
                chars.next();
            }
            '(' => {
                tokens.push(Tok::Open);
                chars.next();
            }
            ')' => {
                tokens.push(Tok::Close);
                chars.next();
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut end = start;
                while let Some(&(i, d)) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        end = i + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let text = &input[start..end];
                let num: f64 = text.parse().map_err(|_| format!("invalid number: {text}"))?;
                tokens.push(Tok::Num(num));
            }
            c => return Err(format!("unexpected character: '{c}'")),
        }
    }

    Ok(tokens)
}

struct Eval {
    tokens: Vec<Tok>,
    pos: usize,
}

fn binding_power(op: char) -> Option<u8> {
    match op {
        '+' | '-' => Some(1),
        '*' | '/' | '%' => Some(2),
        _ => None,
    }
}

impl Eval {
    fn peek(&self) -> Option<Tok> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.peek();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    /// Precedence climbing: parse everything with binding power >= min_bp.
    fn expression(&mut self, min_bp: u8) -> Result<f64, String> {
        let mut lhs = self.atom()?;

        while let Some(Tok::Op(op)) = self.peek() {
            let Some(bp) = binding_power(op) else { break };
            if bp < min_bp {
                break;
            }
            self.next();
            let rhs = self.expression(bp + 1)?;
            lhs = apply(op, lhs, rhs)?;
        }

        Ok(lhs)
    }

    fn atom(&mut self) -> Result<f64, String> {
        match self.next() {
            Some(Tok::Num(n)) => Ok(n),
            Some(Tok::Op('-')) => Ok(-self.atom()?),
            Some(Tok::Open) => {
                let value = self.expression(0)?;
                match self.next() {
                    Some(Tok::Close) => Ok(value),
                    _ => Err("expected closing parenthesis".into()),
                }
            }
            Some(tok) => Err(format!("unexpected token: {tok:?}")),
            None => Err("unexpected end of expression".into()),
        }
    }
}

fn apply(op: char, lhs: f64, rhs: f64) -> Result<f64, String> {
    match op {
        '+' => Ok(lhs + rhs),
        '-' => Ok(lhs - rhs),
        '*' => Ok(lhs * rhs),
        '/' if rhs == 0.0 => Err("division by zero".into()),
        '/' => Ok(lhs / rhs),
        '%' if rhs == 0.0 => Err("remainder by zero".into()),
        '%' => Ok(lhs % rhs),
        _ => Err(format!("unknown operator: {op}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_addition() {
        assert_eq!(evaluate("2 + 3").unwrap(), 5.0);
    }

    #[test]
    fn operator_precedence() {
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14.0);
    }

    #[test]
    fn parentheses() {
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), 20.0);
    }

    #[test]
    fn remainder() {
        assert_eq!(evaluate("10 % 3").unwrap(), 1.0);
    }

    #[test]
    fn unary_negation() {
        assert_eq!(evaluate("-5 + 3").unwrap(), -2.0);
        assert_eq!(evaluate("2 * -3").unwrap(), -6.0);
    }

    #[test]
    fn division_by_zero() {
        assert!(evaluate("1 / 0").is_err());
    }

    #[test]
    fn decimals() {
        assert_eq!(evaluate("3.5 * 2").unwrap(), 7.0);
    }

    #[test]
    fn left_associativity() {
        assert_eq!(evaluate("10 - 4 - 3").unwrap(), 3.0);
        assert_eq!(evaluate("24 / 4 / 2").unwrap(), 3.0);
    }

    #[test]
    fn trailing_garbage_rejected() {
        assert!(evaluate("2 + 3 )").is_err());
    }

    #[test]
    fn incomplete_expression_rejected() {
        assert!(evaluate("2 +").is_err());
        assert!(evaluate("").is_err());
    }

    #[tokio::test]
    async fn tool_execute() {
        let tool = CalculatorTool;
        let output = tool
            .execute(serde_json::json!({"expression": "(10 + 5) / 3"}))
            .await
            .unwrap();
        assert_eq!(output.value["result"], "5");
    }

    #[tokio::test]
    async fn tool_missing_expression() {
        let tool = CalculatorTool;
        let result = tool.execute(serde_json::json!({})).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn tool_reports_bad_expression() {
        let tool = CalculatorTool;
        let result = tool.execute(serde_json::json!({"expression": "2 +"})).await;
        assert!(matches!(result, Err(ToolError::ExecutionFailed { .. })));
    }

    #[test]
    fn tool_definition() {
        let def = CalculatorTool.to_definition();
        assert_eq!(def.name, "calculator");
        assert!(def.parameters["required"][0] == "expression");
    }
}
