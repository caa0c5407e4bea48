use super::Parser;
use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::{Keyword, Token, TokenKind};

impl Parser {
    /// ```text
    /// step := ID skip_env? skip? markers? flaky? parameterize?
    ///         before? after? use? input? output?
    /// ```
    ///
    /// Clauses live one level below the step identifier. Hooks are only
    /// accepted where the keyword table allows them, so hook steps cannot
    /// nest further hooks.
    pub(super) fn parse_step(&mut self, depth: usize) -> Result<Step, ParseError> {
        let Some(Token {
            kind: TokenKind::Identifier(id),
            position,
            ..
        }) = self.advance()
        else {
            return Err(self.unexpected());
        };

        let clause = depth + 1;
        let mut step = Step::new(id, position);

        step.skip_env = self.parse_skip_env(clause)?;
        step.skip = self.parse_skip(clause);
        step.markers = self.parse_markers(clause);
        step.flaky = self.parse_flaky(clause)?;
        step.parameterize = self.parse_parameterize(clause)?;
        if Keyword::Before.allowed_at(clause) {
            step.before = self.parse_hooks(Keyword::Before, clause)?;
        }
        if Keyword::After.allowed_at(clause) {
            step.after = self.parse_hooks(Keyword::After, clause)?;
        }
        step.uses = self.parse_use(clause)?;
        step.input = self.parse_params(Keyword::Input, clause)?;
        step.output = self.parse_params(Keyword::Output, clause)?;

        Ok(step)
    }

    /// `skip_env := SKIP_ENV VALUE`
    fn parse_skip_env(&mut self, depth: usize) -> Result<Option<SkipEnv>, ParseError> {
        let Some(token) = self.eat_keyword(Keyword::SkipEnv, depth) else {
            return Ok(None);
        };
        let (env, _) = self.expect_value()?;
        Ok(Some(SkipEnv {
            env,
            position: token.position,
        }))
    }

    /// `skip := SKIP VALUE*`
    fn parse_skip(&mut self, depth: usize) -> Option<Skip> {
        let token = self.eat_keyword(Keyword::Skip, depth)?;
        let words: Vec<String> = self.values().into_iter().map(|(text, _)| text).collect();
        let reason = (!words.is_empty()).then(|| words.join(" "));
        Some(Skip {
            reason,
            position: token.position,
        })
    }

    /// `flaky := FLAKY VALUE`, the value being a retry count.
    fn parse_flaky(&mut self, depth: usize) -> Result<Option<Flaky>, ParseError> {
        let Some(token) = self.eat_keyword(Keyword::Flaky, depth) else {
            return Ok(None);
        };
        let (value, position) = self.expect_value()?;
        let retries = value
            .trim()
            .parse::<u32>()
            .map_err(|_| ParseError::InvalidValue {
                clause: "flaky",
                value: value.clone(),
                reason: "retry count must be a non-negative integer",
                position,
            })?;
        Ok(Some(Flaky {
            retries,
            position: token.position,
        }))
    }

    /// `parameterize := (PARAMETERIZE | FOREACH) OBJECT`
    fn parse_parameterize(&mut self, depth: usize) -> Result<Option<Parameterize>, ParseError> {
        let (mode, token) = if let Some(token) = self.eat_keyword(Keyword::Parameterize, depth) {
            (ParameterizeMode::Parameterize, token)
        } else if let Some(token) = self.eat_keyword(Keyword::Foreach, depth) {
            (ParameterizeMode::Foreach, token)
        } else {
            return Ok(None);
        };
        let payload = self.expect_object()?;
        Ok(Some(Parameterize {
            mode,
            payload,
            position: token.position,
        }))
    }

    /// `use := USE VALUE`
    fn parse_use(&mut self, depth: usize) -> Result<Option<Use>, ParseError> {
        let Some(token) = self.eat_keyword(Keyword::Use, depth) else {
            return Ok(None);
        };
        let (call, _) = self.expect_value()?;
        Ok(Some(Use {
            call,
            position: token.position,
        }))
    }

    /// `input := INPUT param+` and `output := OUTPUT param+`
    fn parse_params(
        &mut self,
        keyword: Keyword,
        depth: usize,
    ) -> Result<Option<Vec<Param>>, ParseError> {
        if self.eat_keyword(keyword, depth).is_none() {
            return Ok(None);
        }
        let mut params = vec![self.expect_object()?];
        while let Some(param) = self.eat_object() {
            params.push(param);
        }
        Ok(Some(params))
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::document::load;
    use crate::error::{ParseError, Position};
    use crate::lexer::{Keyword, Token, TokenKind, tokenize};
    use crate::parser::parse;

    fn parse_source(source: &str) -> Result<Script, ParseError> {
        parse(tokenize(&load(source).unwrap()).unwrap())
    }

    #[test]
    fn test_parse_full_step() {
        let source = r#"
issue: test case id
steps:
  test step id:
    skip_env: ci
    skip: reason
    markers: smoke
    flaky: 3
    parameterize:
      user: [alice, bob]
    use: func call
    input:
      param:
        env: value
    output:
      param1: value
"#;
        let script = parse_source(source).unwrap();
        let step = &script.steps[0];

        assert_eq!(step.id, "test step id");
        assert_eq!(step.skip_env.as_ref().unwrap().env, "ci");
        assert_eq!(step.skip.as_ref().unwrap().reason.as_deref(), Some("reason"));
        assert_eq!(step.markers.as_ref().unwrap().names, vec!["smoke"]);
        assert_eq!(step.flaky.as_ref().unwrap().retries, 3);

        let parameterize = step.parameterize.as_ref().unwrap();
        assert_eq!(parameterize.mode, ParameterizeMode::Parameterize);
        assert_eq!(
            parameterize.payload.object,
            serde_json::json!({"user": ["alice", "bob"]})
        );

        assert_eq!(step.uses.as_ref().unwrap().call, "func call");
        assert_eq!(step.input.as_ref().unwrap().len(), 1);
        assert_eq!(
            step.output.as_ref().unwrap()[0].object,
            serde_json::json!({"param1": "value"})
        );
        assert!(step.is_skipped());
    }

    #[test]
    fn test_bare_skip() {
        let script = parse_source("issue: t\nsteps:\n  s1:\n    skip:\n").unwrap();
        let skip = script.steps[0].skip.as_ref().unwrap();
        assert!(skip.reason.is_none());
        assert_eq!(skip.position, Position::new(3, 4));
    }

    #[test]
    fn test_foreach_mode() {
        let script = parse_source("issue: t\nsteps:\n  s1:\n    foreach: [1, 2, 3]\n").unwrap();
        let parameterize = script.steps[0].parameterize.as_ref().unwrap();
        assert_eq!(parameterize.mode, ParameterizeMode::Foreach);
        assert_eq!(parameterize.payload.object, serde_json::json!([1, 2, 3]));
    }

    #[test]
    fn test_step_hooks_nest_one_level() {
        let source = "issue: t\nsteps:\n  s1:\n    before:\n      h1:\n        use: login\n      h2:\n    use: act\n  s2:\n";
        let script = parse_source(source).unwrap();
        assert_eq!(script.steps.len(), 2);

        let s1 = &script.steps[0];
        let hooks = s1.before.as_ref().unwrap();
        assert_eq!(hooks.steps.len(), 2);
        assert_eq!(hooks.steps[0].id, "h1");
        assert_eq!(hooks.steps[0].uses.as_ref().unwrap().call, "login");
        assert_eq!(hooks.steps[1].id, "h2");
        assert_eq!(s1.uses.as_ref().unwrap().call, "act");
        assert_eq!(script.steps[1].id, "s2");
    }

    #[test]
    fn test_hook_steps_cannot_nest_hooks() {
        let source = "issue: t\nsteps:\n  s1:\n    before:\n      h1:\n        before:\n          deeper:\n";
        let err = parse_source(source).unwrap_err();
        match err {
            ParseError::UnexpectedToken {
                found, position, ..
            } => {
                assert_eq!(found, "identifier 'before'");
                assert_eq!(position, Position::new(5, 8));
            }
            other => panic!("Expected UnexpectedToken, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_order_clause() {
        let source = "issue: t\nsteps:\n  s1:\n    use: call\n    skip: later\n";
        let err = parse_source(source).unwrap_err();
        match err {
            ParseError::UnexpectedToken {
                found,
                expected,
                position,
            } => {
                assert_eq!(found, "keyword 'skip'");
                assert_eq!(expected, vec!["INPUT", "OUTPUT", "ID"]);
                assert_eq!(position, Position::new(4, 4));
            }
            other => panic!("Expected UnexpectedToken, got {:?}", other),
        }
    }

    #[test]
    fn test_flaky_must_be_count() {
        let err = parse_source("issue: t\nsteps:\n  s1:\n    flaky: often\n").unwrap_err();
        assert!(matches!(err, ParseError::InvalidValue { clause: "flaky", .. }));
        assert_eq!(err.position(), Position::new(3, 11));
    }

    #[test]
    fn test_use_requires_value() {
        let err = parse_source("issue: t\nsteps:\n  s1:\n    use:\n  s2:\n").unwrap_err();
        match err {
            ParseError::UnexpectedToken {
                found, expected, ..
            } => {
                assert_eq!(found, "identifier 's2'");
                assert_eq!(expected, vec!["VALUE"]);
            }
            other => panic!("Expected UnexpectedToken, got {:?}", other),
        }
    }

    #[test]
    fn test_input_accepts_several_objects() {
        let tokens = vec![
            Token::new(TokenKind::Keyword(Keyword::Issue), Position::new(0, 0), 0),
            Token::new(TokenKind::Value("t".into()), Position::new(0, 7), 0),
            Token::new(TokenKind::Keyword(Keyword::Steps), Position::new(1, 0), 0),
            Token::new(TokenKind::Identifier("s1".into()), Position::new(2, 2), 1),
            Token::new(TokenKind::Keyword(Keyword::Input), Position::new(3, 4), 2),
            Token::new(TokenKind::Object(serde_json::json!({"a": 1})), Position::new(4, 6), 2),
            Token::new(TokenKind::Object(serde_json::json!({"b": 2})), Position::new(5, 6), 2),
        ];
        let script = parse(tokens).unwrap();
        assert_eq!(script.steps[0].input.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn test_input_requires_object() {
        let tokens = vec![
            Token::new(TokenKind::Keyword(Keyword::Issue), Position::new(0, 0), 0),
            Token::new(TokenKind::Value("t".into()), Position::new(0, 7), 0),
            Token::new(TokenKind::Keyword(Keyword::Steps), Position::new(1, 0), 0),
            Token::new(TokenKind::Identifier("s1".into()), Position::new(2, 2), 1),
            Token::new(TokenKind::Keyword(Keyword::Input), Position::new(3, 4), 2),
        ];
        let err = parse(tokens).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedEnd { .. }));
        assert_eq!(err.expected(), &["OBJECT"]);
        assert_eq!(err.position(), Position::new(3, 4));
    }
}
