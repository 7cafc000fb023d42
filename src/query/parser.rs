use super::ast::*;
use super::lexer::{Lexer, Token};
use super::value::Value;
use crate::error::{Error, Result};

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(query: &str) -> Result<Self> {
        let mut lexer = Lexer::new(query);
        let tokens = lexer.tokenize()?;
        Ok(Self {
            tokens,
            position: 0,
        })
    }

    pub fn parse(&mut self) -> Result<SelectStatement> {
        let statement = self.parse_select()?;
        if self.current_token() != &Token::Eof {
            return Err(Error::QuerySyntax(format!(
                "Unexpected token after end of query: {:?}",
                self.current_token()
            )));
        }
        Ok(statement)
    }

    fn parse_select(&mut self) -> Result<SelectStatement> {
        self.expect_token(&Token::Select)?;

        let distinct = self.match_token(&Token::Distinct);
        let projection = self.parse_projection()?;

        self.expect_token(&Token::From)?;
        let from = self.parse_from()?;

        let selection = if self.match_token(&Token::Where) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        let order_by = if self.match_token(&Token::Order) {
            self.expect_token(&Token::By)?;
            self.parse_order_by()?
        } else {
            vec![]
        };

        let limit = if self.match_token(&Token::Limit) {
            Some(self.parse_limit()?)
        } else {
            None
        };

        Ok(SelectStatement {
            distinct,
            projection,
            from,
            selection,
            order_by,
            limit,
        })
    }

    fn parse_projection(&mut self) -> Result<Projection> {
        if self.match_token(&Token::Star) {
            return Ok(Projection::Wildcard);
        }

        if self.match_token(&Token::Count) {
            self.expect_token(&Token::LeftParen)?;
            self.expect_token(&Token::Star)?;
            self.expect_token(&Token::RightParen)?;
            return Ok(Projection::Count);
        }

        let mut items = vec![];
        loop {
            let expr = self.parse_expr()?;
            let alias = if self.match_token(&Token::As) {
                Some(self.parse_identifier()?)
            } else {
                None
            };
            items.push(SelectItem { expr, alias });

            if !self.match_token(&Token::Comma) {
                break;
            }
        }

        Ok(Projection::Items(items))
    }

    fn parse_from(&mut self) -> Result<FromClause> {
        self.expect_token(&Token::Slash)?;
        let region = self.parse_identifier()?;

        if self.current_token() == &Token::Slash {
            return Err(Error::QuerySyntax(format!(
                "Subregion paths are not supported: /{}/...",
                region
            )));
        }

        let collection = if self.match_token(&Token::Dot) {
            let name = self.parse_identifier()?;
            match name.as_str() {
                "keys" | "keySet" => RegionCollection::Keys,
                "values" => RegionCollection::Values,
                _ => {
                    return Err(Error::QuerySyntax(format!(
                        "Unknown region collection '.{}', expected .keys, .keySet or .values",
                        name
                    )));
                }
            }
        } else {
            RegionCollection::Values
        };

        let alias = if self.match_token(&Token::As) {
            Some(self.parse_identifier()?)
        } else if let Token::Identifier(id) = self.current_token() {
            // Implicit alias, as in `FROM /Portfolios p`
            let alias = id.clone();
            self.advance();
            Some(alias)
        } else {
            None
        };

        Ok(FromClause {
            region,
            collection,
            alias,
        })
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or_expr()
    }

    fn parse_or_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_and_expr()?;

        while self.match_token(&Token::Or) {
            let right = self.parse_and_expr()?;
            left = Expr::BinaryOp {
                left: Box::new(left),
                op: BinaryOperator::Or,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_not_expr()?;

        while self.match_token(&Token::And) {
            let right = self.parse_not_expr()?;
            left = Expr::BinaryOp {
                left: Box::new(left),
                op: BinaryOperator::And,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_not_expr(&mut self) -> Result<Expr> {
        if self.match_token(&Token::Not) {
            let expr = self.parse_not_expr()?;
            return Ok(Expr::Not(Box::new(expr)));
        }

        self.parse_comparison_expr()
    }

    fn parse_comparison_expr(&mut self) -> Result<Expr> {
        let left = self.parse_primary_expr()?;

        if let Some(op) = self.match_comparison_op() {
            let right = self.parse_primary_expr()?;
            return Ok(Expr::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            });
        }

        if self.match_token(&Token::Is) {
            let negated = self.match_token(&Token::Not);
            self.expect_token(&Token::Null)?;
            return Ok(Expr::IsNull {
                expr: Box::new(left),
                negated,
            });
        }

        let negated = self.match_token(&Token::Not);

        if self.match_token(&Token::In) {
            self.expect_token(&Token::LeftParen)?;
            let mut list = vec![self.parse_primary_expr()?];
            while self.match_token(&Token::Comma) {
                list.push(self.parse_primary_expr()?);
            }
            self.expect_token(&Token::RightParen)?;
            return Ok(Expr::InList {
                expr: Box::new(left),
                list,
                negated,
            });
        }

        if self.match_token(&Token::Like) {
            let pattern = self.parse_primary_expr()?;
            return Ok(Expr::Like {
                expr: Box::new(left),
                pattern: Box::new(pattern),
                negated,
            });
        }

        if negated {
            return Err(Error::QuerySyntax(format!(
                "Expected IN or LIKE after NOT, found {:?}",
                self.current_token()
            )));
        }

        Ok(left)
    }

    fn parse_primary_expr(&mut self) -> Result<Expr> {
        match self.current_token().clone() {
            Token::Number(n) => {
                self.advance();
                Ok(Expr::Literal(parse_number(&n, false)?))
            }
            Token::Minus => {
                self.advance();
                match self.current_token().clone() {
                    Token::Number(n) => {
                        self.advance();
                        Ok(Expr::Literal(parse_number(&n, true)?))
                    }
                    other => Err(Error::QuerySyntax(format!(
                        "Expected number after '-', found {:?}",
                        other
                    ))),
                }
            }
            Token::String(s) => {
                self.advance();
                Ok(Expr::Literal(Value::String(s)))
            }
            Token::True => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(true)))
            }
            Token::False => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(false)))
            }
            Token::Null => {
                self.advance();
                Ok(Expr::Literal(Value::Null))
            }
            Token::Parameter(index) => {
                self.advance();
                Ok(Expr::Parameter(index))
            }
            Token::Identifier(name) => {
                self.advance();
                let mut segments = vec![name];
                while self.match_token(&Token::Dot) {
                    segments.push(self.parse_identifier()?);
                }
                Ok(Expr::Path(segments))
            }
            Token::LeftParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect_token(&Token::RightParen)?;
                Ok(expr)
            }
            other => Err(Error::QuerySyntax(format!(
                "Unexpected token: {:?}",
                other
            ))),
        }
    }

    fn parse_order_by(&mut self) -> Result<Vec<OrderByExpr>> {
        let mut order_by = vec![];

        loop {
            let expr = self.parse_expr()?;
            let asc = if self.match_token(&Token::Desc) {
                false
            } else {
                self.match_token(&Token::Asc);
                true
            };

            order_by.push(OrderByExpr { expr, asc });

            if !self.match_token(&Token::Comma) {
                break;
            }
        }

        Ok(order_by)
    }

    fn parse_limit(&mut self) -> Result<usize> {
        match self.current_token().clone() {
            Token::Number(n) => {
                self.advance();
                n.parse::<usize>()
                    .map_err(|_| Error::QuerySyntax(format!("Invalid LIMIT: {}", n)))
            }
            other => Err(Error::QuerySyntax(format!(
                "Expected number after LIMIT, found {:?}",
                other
            ))),
        }
    }

    fn parse_identifier(&mut self) -> Result<String> {
        match self.current_token() {
            Token::Identifier(id) => {
                let name = id.clone();
                self.advance();
                Ok(name)
            }
            other => Err(Error::QuerySyntax(format!(
                "Expected identifier, found {:?}",
                other
            ))),
        }
    }

    fn match_comparison_op(&mut self) -> Option<BinaryOperator> {
        let op = match self.current_token() {
            Token::Equal => BinaryOperator::Equal,
            Token::NotEqual => BinaryOperator::NotEqual,
            Token::Less => BinaryOperator::Less,
            Token::LessEqual => BinaryOperator::LessEqual,
            Token::Greater => BinaryOperator::Greater,
            Token::GreaterEqual => BinaryOperator::GreaterEqual,
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn current_token(&self) -> &Token {
        self.tokens.get(self.position).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn match_token(&mut self, token: &Token) -> bool {
        if self.current_token() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_token(&mut self, token: &Token) -> Result<()> {
        if self.match_token(token) {
            Ok(())
        } else {
            Err(Error::QuerySyntax(format!(
                "Expected {:?}, found {:?}",
                token,
                self.current_token()
            )))
        }
    }
}

fn parse_number(text: &str, negative: bool) -> Result<Value> {
    let invalid = || Error::QuerySyntax(format!("Invalid number: {}", text));

    if text.contains('.') {
        let f: f64 = text.parse().map_err(|_| invalid())?;
        Ok(Value::Float(if negative { -f } else { f }))
    } else {
        let i: i64 = text.parse().map_err(|_| invalid())?;
        Ok(Value::Int(if negative { -i } else { i }))
    }
}

/// Parse a complete query string.
pub fn parse_query(query: &str) -> Result<SelectStatement> {
    Parser::new(query)?.parse()
}
