use crate::ast::*;
use crate::error::Result;
use crate::lexer::{LocatedToken, Token};
use crate::{bail_parse_at, err_parse_at};
use log::trace;

#[cfg(test)]
mod tests;

/// One entry of an argument list before it is sorted onto a side.
enum OutArgument {
    Required(Application),
    Optional(OptionalArgument),
    Arbitrary(Application),
    Keyword(Application),
}

enum InArgument {
    Required(Variable),
    Optional(OptionalArgument),
    Arbitrary(Variable),
    Keyword(Variable),
}

/// Recursive descent parser over the token stream.
///
/// Newlines separate expressions at the top level and inside function
/// bodies; inside parentheses, brackets and dictionaries they are ignored.
pub struct Parser {
    tokens: Vec<LocatedToken>,
    current: usize,
    /// Whether newlines are significant, innermost context last.
    newline_contexts: Vec<bool>,
}

impl Parser {
    pub fn new(tokens: Vec<LocatedToken>) -> Self {
        Parser {
            tokens,
            current: 0,
            newline_contexts: vec![true],
        }
    }

    pub fn parse(&mut self) -> Result<Program> {
        let expressions = self.parse_expressions(None)?;
        Ok(Program { expressions })
    }

    /// Parse separator-delimited expressions until `terminator` (or the end
    /// of input when `None`). The terminator is consumed.
    fn parse_expressions(&mut self, terminator: Option<Token>) -> Result<Vec<Expression>> {
        let mut expressions = Vec::new();
        loop {
            while self.check(&Token::Semicolon) || self.check(&Token::Newline) {
                self.advance();
            }
            if self.at_terminator(&terminator) {
                if terminator.is_some() {
                    self.advance();
                }
                return Ok(expressions);
            }
            if let (Some(t), true) = (&terminator, self.is_at_end()) {
                bail_parse_at!(self.previous_span(), "Expected {:?} before end of input", t);
            }

            expressions.push(self.parse_expression()?);

            if !self.at_terminator(&terminator) && !self.check(&Token::Semicolon) && !self.check(&Token::Newline) {
                let span = self.current_span();
                bail_parse_at!(span, "Expected end of expression, got {:?}", self.peek());
            }
        }
    }

    fn at_terminator(&mut self, terminator: &Option<Token>) -> bool {
        match terminator {
            None => self.peek_significant().is_none(),
            Some(t) => self.peek_significant() == Some(t),
        }
    }

    fn parse_expression(&mut self) -> Result<Expression> {
        trace!("parse_expression: next token = {:?}", self.peek());
        let start = self.current_span();
        let application = self.parse_application()?;

        let definition = match self.peek_significant() {
            Some(Token::Equals) => true,
            Some(Token::ColonEquals) => false,
            _ => return Ok(Expression::Application(application)),
        };
        self.advance();

        let assignee = match <[Term; 1]>::try_from(application.terms) {
            Ok([term]) => term,
            Err(_) => bail_parse_at!(application.span, "left-hand side of an assignment must be a single term"),
        };
        let value = self.parse_application()?;
        let assignment = Assignment {
            assignee,
            value,
            span: start.merge(&self.previous_span()),
        };
        Ok(if definition {
            Expression::Definition(assignment)
        } else {
            Expression::Mutation(assignment)
        })
    }

    fn parse_application(&mut self) -> Result<Application> {
        let start = self.current_span();
        let mut terms = Vec::new();
        while self.starts_term() {
            terms.push(self.parse_term()?);
        }
        if terms.is_empty() {
            let span = self.current_span();
            bail_parse_at!(span, "Expected expression, got {:?}", self.peek());
        }
        Ok(Application {
            terms,
            span: start.merge(&self.previous_span()),
        })
    }

    fn starts_term(&mut self) -> bool {
        matches!(
            self.peek_significant(),
            Some(
                Token::Identifier(_)
                    | Token::Integer(_)
                    | Token::Float(_)
                    | Token::CharString(_)
                    | Token::ByteString(_)
                    | Token::LeftParen
                    | Token::LeftBracket
                    | Token::LeftBrace
            )
        )
    }

    fn parse_term(&mut self) -> Result<Term> {
        let start = self.current_span();
        let value = self.parse_value()?;
        let mut trailers = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.advance();
                    match self.tokens.get(self.current) {
                        Some(LocatedToken {
                            token: Token::Identifier(field),
                            spaced: false,
                            ..
                        }) => {
                            let field = Variable::user(field.clone());
                            self.advance();
                            trailers.push(Trailer::Field(field));
                        }
                        _ => trailers.push(Trailer::OpenCall),
                    }
                }
                Some(Token::LeftParen) if !self.current_spaced() => {
                    self.advance();
                    trailers.push(Trailer::ClosedCall(self.parse_closed_call()?));
                }
                Some(Token::LeftBracket) if !self.current_spaced() => {
                    self.advance();
                    self.newline_contexts.push(false);
                    let index = self.parse_expressions(Some(Token::RightBracket));
                    self.newline_contexts.pop();
                    trailers.push(Trailer::Index(index?));
                }
                _ => break,
            }
        }
        Ok(Term {
            value,
            trailers,
            span: start.merge(&self.previous_span()),
        })
    }

    fn parse_value(&mut self) -> Result<Value> {
        let span = self.current_span();
        let token = self.advance().cloned();
        match token {
            Some(Token::Identifier(name)) => Ok(Value::Variable(Variable::user(name))),
            Some(Token::Integer(n)) => Ok(Value::Integer(n)),
            Some(Token::Float(x)) => Ok(Value::Float(x)),
            Some(Token::CharString(s)) => Ok(Value::CharString(s)),
            Some(Token::ByteString(b)) => Ok(Value::ByteString(b)),
            Some(Token::LeftParen) => {
                self.newline_contexts.push(false);
                let expressions = self.parse_expressions(Some(Token::RightParen));
                self.newline_contexts.pop();
                Ok(Value::SubExpression(expressions?))
            }
            Some(Token::LeftBracket) => {
                self.newline_contexts.push(false);
                let elements = self.parse_comma_list(Token::RightBracket, |p| p.parse_application());
                self.newline_contexts.pop();
                Ok(Value::Array(elements?))
            }
            Some(Token::LeftBrace) => self.parse_brace(),
            other => Err(err_parse_at!(span, "Expected a value, got {:?}", other)),
        }
    }

    /// Comma separated items with an optional trailing comma, up to and
    /// including `close`.
    fn parse_comma_list<T>(
        &mut self,
        close: Token,
        mut item: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(&close) {
                self.advance();
                return Ok(items);
            }
            items.push(item(self)?);
            self.skip_newlines();
            if self.check(&Token::Comma) {
                self.advance();
            } else {
                self.expect(close.clone())?;
                return Ok(items);
            }
        }
    }

    /// After `{`: an empty dictionary, a dictionary, or a function.
    fn parse_brace(&mut self) -> Result<Value> {
        self.skip_newlines();
        if self.check(&Token::RightBrace) {
            self.advance();
            return Ok(Value::Dictionary(Vec::new()));
        }
        if self.check(&Token::Pipe) {
            self.advance();
            return self.parse_function();
        }

        let mark = self.current;
        if self.starts_term() {
            self.newline_contexts.push(true);
            let first = self.parse_application();
            self.newline_contexts.pop();
            if let (Ok(first), true) = (first, self.check(&Token::Colon)) {
                self.newline_contexts.push(false);
                let entries = self.parse_dictionary(first);
                self.newline_contexts.pop();
                return Ok(Value::Dictionary(entries?));
            }
        }

        // A function body without an argument list.
        self.current = mark;
        self.newline_contexts.push(true);
        let expressions = self.parse_expressions(Some(Token::RightBrace));
        self.newline_contexts.pop();
        Ok(Value::Function(Function::nullary(expressions?)))
    }

    fn parse_dictionary(&mut self, first_key: Application) -> Result<Vec<DictDefinition>> {
        self.expect(Token::Colon)?;
        let first_value = self.parse_application()?;
        let mut entries = vec![DictDefinition {
            key: first_key,
            value: first_value,
        }];
        self.skip_newlines();
        if self.check(&Token::Comma) {
            self.advance();
            entries.extend(self.parse_comma_list(Token::RightBrace, |p| {
                let key = p.parse_application()?;
                p.expect(Token::Colon)?;
                let value = p.parse_application()?;
                Ok(DictDefinition { key, value })
            })?);
        } else {
            self.expect(Token::RightBrace)?;
        }
        Ok(entries)
    }

    /// After `{|`: argument list, closing `|`, then the body up to `}`.
    fn parse_function(&mut self) -> Result<Value> {
        self.newline_contexts.push(false);
        let sides = self.parse_sides(Token::Pipe, |p| p.parse_in_argument());
        self.newline_contexts.pop();
        let (left, right) = sides?;

        // Slots are numbered outward from the call: required arguments sit
        // nearest to it on both sides, so declaration order must agree.
        let mut function = Function::nullary(Vec::new());
        for arg in left {
            match arg {
                InArgument::Required(v) => function.left_required.push(v),
                InArgument::Optional(o) => {
                    if !function.left_required.is_empty() {
                        bail_parse_at!(
                            self.previous_span(),
                            "optional left argument {} must come before the required ones",
                            o.name.name
                        );
                    }
                    function.left_optional.push(o)
                }
                InArgument::Arbitrary(v) => {
                    if function.left_arbitrary.replace(v).is_some() {
                        bail_parse_at!(self.previous_span(), "more than one left arbitrary argument");
                    }
                }
                InArgument::Keyword(_) => {
                    bail_parse_at!(self.previous_span(), "keyword arguments are only allowed on the right")
                }
            }
        }
        for arg in right {
            match arg {
                InArgument::Required(v) => {
                    if !function.right_optional.is_empty() {
                        bail_parse_at!(
                            self.previous_span(),
                            "required right argument {} must come before the optional ones",
                            v.name
                        );
                    }
                    function.right_required.push(v)
                }
                InArgument::Optional(o) => function.right_optional.push(o),
                InArgument::Arbitrary(v) => {
                    if function.right_arbitrary.replace(v).is_some() {
                        bail_parse_at!(self.previous_span(), "more than one right arbitrary argument");
                    }
                }
                InArgument::Keyword(v) => {
                    if function.right_keyword.replace(v).is_some() {
                        bail_parse_at!(self.previous_span(), "more than one keyword argument");
                    }
                }
            }
        }

        self.newline_contexts.push(true);
        let expressions = self.parse_expressions(Some(Token::RightBrace));
        self.newline_contexts.pop();
        function.expressions = expressions?;
        Ok(Value::Function(function))
    }

    /// After `(` of a closed call.
    fn parse_closed_call(&mut self) -> Result<ClosedCall> {
        self.newline_contexts.push(false);
        let sides = self.parse_sides(Token::RightParen, |p| p.parse_out_argument());
        self.newline_contexts.pop();
        let (left, right) = sides?;

        let mut call = ClosedCall::default();
        for arg in left {
            match arg {
                OutArgument::Required(app) => call.left_required.push(app),
                OutArgument::Arbitrary(app) => {
                    if call.left_arbitrary.replace(app).is_some() {
                        bail_parse_at!(self.previous_span(), "more than one left arbitrary argument");
                    }
                }
                OutArgument::Optional(_) | OutArgument::Keyword(_) => {
                    bail_parse_at!(
                        self.previous_span(),
                        "named arguments are only allowed on the right"
                    )
                }
            }
        }
        for arg in right {
            match arg {
                OutArgument::Required(app) => call.right_required.push(app),
                OutArgument::Optional(opt) => call.right_optional.push(opt),
                OutArgument::Arbitrary(app) => {
                    if call.right_arbitrary.replace(app).is_some() {
                        bail_parse_at!(self.previous_span(), "more than one right arbitrary argument");
                    }
                }
                OutArgument::Keyword(app) => {
                    if call.right_keyword.replace(app).is_some() {
                        bail_parse_at!(self.previous_span(), "more than one keyword argument");
                    }
                }
            }
        }
        Ok(call)
    }

    /// Comma separated arguments where the first `;` splits left from right.
    /// Without a `;` every argument is on the right. Returns (left, right).
    fn parse_sides<T>(
        &mut self,
        close: Token,
        mut item: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<(Vec<T>, Vec<T>)> {
        let mut first = Vec::new();
        let mut second = Vec::new();
        let mut split = false;
        loop {
            self.skip_newlines();
            if self.check(&close) {
                self.advance();
                break;
            }
            if self.check(&Token::Semicolon) && !split {
                self.advance();
                split = true;
                continue;
            }
            let arg = item(self)?;
            if split { second.push(arg) } else { first.push(arg) }

            self.skip_newlines();
            if self.check(&Token::Comma) {
                self.advance();
            } else if !(self.check(&Token::Semicolon) && !split) && !self.check(&close) {
                let span = self.current_span();
                bail_parse_at!(span, "Expected ',' or {:?}, got {:?}", close, self.peek());
            }
        }
        Ok(if split { (first, second) } else { (Vec::new(), first) })
    }

    fn parse_out_argument(&mut self) -> Result<OutArgument> {
        match self.peek2() {
            (Some(Token::ColonColon), _) => {
                self.advance();
                Ok(OutArgument::Keyword(self.parse_parenthesized_application()?))
            }
            (Some(Token::Colon), _) => {
                self.advance();
                Ok(OutArgument::Arbitrary(self.parse_parenthesized_application()?))
            }
            (Some(Token::Identifier(name)), Some(Token::Colon)) => {
                let name = Variable::user(name.clone());
                self.advance();
                self.advance();
                let value = self.parse_application()?;
                Ok(OutArgument::Optional(OptionalArgument { name, value }))
            }
            _ => Ok(OutArgument::Required(self.parse_application()?)),
        }
    }

    fn parse_in_argument(&mut self) -> Result<InArgument> {
        match self.peek() {
            Some(Token::ColonColon) => {
                self.advance();
                Ok(InArgument::Keyword(self.parse_parenthesized_variable()?))
            }
            Some(Token::Colon) => {
                self.advance();
                Ok(InArgument::Arbitrary(self.parse_parenthesized_variable()?))
            }
            _ => {
                let name = Variable::user(self.expect_identifier()?);
                if self.check(&Token::Colon) {
                    self.advance();
                    let value = self.parse_application()?;
                    Ok(InArgument::Optional(OptionalArgument { name, value }))
                } else {
                    Ok(InArgument::Required(name))
                }
            }
        }
    }

    fn parse_parenthesized_application(&mut self) -> Result<Application> {
        self.expect(Token::LeftParen)?;
        let app = self.parse_application()?;
        self.skip_newlines();
        self.expect(Token::RightParen)?;
        Ok(app)
    }

    fn parse_parenthesized_variable(&mut self) -> Result<Variable> {
        self.expect(Token::LeftParen)?;
        let name = self.expect_identifier()?;
        self.expect(Token::RightParen)?;
        Ok(Variable::user(name))
    }

    // ------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------

    fn current_span(&self) -> Span {
        self.tokens
            .get(self.current)
            .or_else(|| self.tokens.last())
            .map(|t| t.span)
            .unwrap_or(Span::new(0, 0, 0, 0))
    }

    fn previous_span(&self) -> Span {
        if self.current > 0 {
            self.tokens.get(self.current - 1).map(|t| t.span).unwrap_or(Span::new(0, 0, 0, 0))
        } else {
            self.current_span()
        }
    }

    fn current_spaced(&self) -> bool {
        self.tokens.get(self.current).map(|t| t.spaced).unwrap_or(true)
    }

    fn newlines_significant(&self) -> bool {
        self.newline_contexts.last().copied().unwrap_or(true)
    }

    fn skip_newlines(&mut self) {
        while self.check(&Token::Newline) {
            self.advance();
        }
    }

    /// Peek, skipping newlines when they are only whitespace here.
    fn peek_significant(&mut self) -> Option<&Token> {
        if !self.newlines_significant() {
            self.skip_newlines();
        }
        self.peek()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current).map(|lt| &lt.token)
    }

    fn peek2(&self) -> (Option<&Token>, Option<&Token>) {
        (self.peek(), self.tokens.get(self.current + 1).map(|lt| &lt.token))
    }

    fn advance(&mut self) -> Option<&Token> {
        if !self.is_at_end() {
            self.current += 1;
            self.tokens.get(self.current - 1).map(|lt| &lt.token)
        } else {
            None
        }
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn expect(&mut self, token: Token) -> Result<()> {
        if self.check(&token) {
            self.advance();
            Ok(())
        } else {
            let span = self.current_span();
            Err(err_parse_at!(span, "Expected {:?}, got {:?}", token, self.peek()))
        }
    }

    fn expect_identifier(&mut self) -> Result<String> {
        let span = self.current_span();
        match self.advance() {
            Some(Token::Identifier(name)) => Ok(name.clone()),
            other => Err(err_parse_at!(span, "Expected identifier, got {:?}", other)),
        }
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.tokens.len()
    }
}
