use super::parse_program;
use crate::ast::{BinaryOp, Expr, Statement};

fn only_statement(src: &str) -> Statement {
    let program = parse_program(src).unwrap();
    assert_eq!(program.body.len(), 1, "expected exactly one top-level line");
    assert_eq!(program.body[0].statements.len(), 1, "expected exactly one statement");
    program.body[0].statements[0].clone()
}

#[test]
fn assignment_parses_rhs_expression() {
    match only_statement("A=3+4*2") {
        Statement::Assignment { var, expr, .. } => {
            assert_eq!(var, 'A');
            assert_eq!(
                expr,
                Expr::Binary {
                    op: BinaryOp::Add,
                    left: Box::new(Expr::NumericLiteral(3)),
                    right: Box::new(Expr::Binary {
                        op: BinaryOp::Mul,
                        left: Box::new(Expr::NumericLiteral(4)),
                        right: Box::new(Expr::NumericLiteral(2)),
                    }),
                }
            );
        }
        other => panic!("expected Assignment, got {:?}", other),
    }
}

#[test]
fn binary_operators_are_left_associative() {
    match only_statement("A=10-3-2") {
        Statement::Assignment { expr, .. } => {
            // (10-3)-2, not 10-(3-2)
            assert_eq!(
                expr,
                Expr::Binary {
                    op: BinaryOp::Sub,
                    left: Box::new(Expr::Binary {
                        op: BinaryOp::Sub,
                        left: Box::new(Expr::NumericLiteral(10)),
                        right: Box::new(Expr::NumericLiteral(3)),
                    }),
                    right: Box::new(Expr::NumericLiteral(2)),
                }
            );
        }
        other => panic!("expected Assignment, got {:?}", other),
    }
}

#[test]
fn parens_reset_precedence() {
    match only_statement("A=(3+4)*2") {
        Statement::Assignment { expr, .. } => {
            assert_eq!(
                expr,
                Expr::Binary {
                    op: BinaryOp::Mul,
                    left: Box::new(Expr::Binary {
                        op: BinaryOp::Add,
                        left: Box::new(Expr::NumericLiteral(3)),
                        right: Box::new(Expr::NumericLiteral(4)),
                    }),
                    right: Box::new(Expr::NumericLiteral(2)),
                }
            );
        }
        other => panic!("expected Assignment, got {:?}", other),
    }
}

#[test]
fn output_string_literal() {
    match only_statement(r#"?="hello""#) {
        Statement::Output { expr: Expr::StringLiteral(s), .. } => assert_eq!(s, "hello"),
        other => panic!("expected Output, got {:?}", other),
    }
}

#[test]
fn inline_if_body_is_rest_of_line() {
    let program = parse_program(";=A>5 ?=A #=!").unwrap();
    let stmts = &program.body[0].statements;
    assert_eq!(stmts.len(), 1);
    match &stmts[0] {
        Statement::IfBlock { then_body, else_body, .. } => {
            assert_eq!(then_body.len(), 2);
            assert!(else_body.is_none());
        }
        other => panic!("expected IfBlock, got {:?}", other),
    }
}

#[test]
fn block_if_with_else_splits_on_bare_semicolon() {
    let src = ";=A>5\n?=\"big\"\n;\n?=\"small\"\n#=;\n";
    let program = parse_program(src).unwrap();
    assert_eq!(program.body.len(), 1);
    match &program.body[0].statements[0] {
        Statement::IfBlock { then_body, else_body, .. } => {
            assert_eq!(then_body.len(), 1);
            assert_eq!(else_body.as_ref().unwrap().len(), 1);
        }
        other => panic!("expected IfBlock, got {:?}", other),
    }
}

#[test]
fn unclosed_block_if_is_a_parse_error() {
    let src = ";=A>5\n?=\"big\"\n";
    assert!(parse_program(src).is_err());
}

#[test]
fn for_block_collects_three_part_header() {
    let src = "@=I,1,10,2\nS=S+I\n#=@\n";
    let program = parse_program(src).unwrap();
    match &program.body[0].statements[0] {
        Statement::ForBlock { var, start, end, step, body, .. } => {
            assert_eq!(*var, 'I');
            assert_eq!(*start, Expr::NumericLiteral(1));
            assert_eq!(*end, Expr::NumericLiteral(10));
            assert_eq!(*step, Some(Expr::NumericLiteral(2)));
            assert_eq!(body.len(), 1);
        }
        other => panic!("expected ForBlock, got {:?}", other),
    }
}

#[test]
fn for_header_without_step_defaults_to_none() {
    let src = "@=I,1,10\nS=S+I\n#=@\n";
    let program = parse_program(src).unwrap();
    match &program.body[0].statements[0] {
        Statement::ForBlock { step, .. } => assert!(step.is_none()),
        other => panic!("expected ForBlock, got {:?}", other),
    }
}

#[test]
fn while_requires_parenthesized_condition() {
    let src = "@=(A<10)\nA=A+1\n#=@\n";
    let program = parse_program(src).unwrap();
    match &program.body[0].statements[0] {
        Statement::WhileBlock { condition, body, .. } => {
            assert_eq!(
                *condition,
                Expr::Binary {
                    op: BinaryOp::Lt,
                    left: Box::new(Expr::Identifier('A')),
                    right: Box::new(Expr::NumericLiteral(10)),
                }
            );
            assert_eq!(body.len(), 1);
        }
        other => panic!("expected WhileBlock, got {:?}", other),
    }
}

#[test]
fn for_or_while_with_trailing_statement_on_same_line_is_an_error() {
    assert!(parse_program("@=I,1,10 ?=I\n#=@\n").is_err());
}

#[test]
fn goto_and_gosub_targets_resolve_through_label_map() {
    let src = "!=^SUB\n?=\"after\" /\n#=-1\n^SUB\n?=\"in\" /\n#=!\n";
    let program = parse_program(src).unwrap();
    assert_eq!(program.labels.get("SUB"), Some(&3));
    match &program.body[0].statements[0] {
        Statement::Gosub { label, .. } => assert_eq!(label, "SUB"),
        other => panic!("expected Gosub, got {:?}", other),
    }
}

#[test]
fn duplicate_label_is_a_parse_error() {
    let src = "^A\n?=1 /\n^A\n?=2 /\n";
    assert!(parse_program(src).is_err());
}

#[test]
fn array_assignment_vs_initialization_by_value_count() {
    match only_statement("[0]=5") {
        Statement::ArrayAssignment { expr, .. } => assert_eq!(expr, Expr::NumericLiteral(5)),
        other => panic!("expected ArrayAssignment, got {:?}", other),
    }
    match only_statement("[0]=1,2,3") {
        Statement::ArrayInitialization { exprs, .. } => assert_eq!(exprs.len(), 3),
        other => panic!("expected ArrayInitialization, got {:?}", other),
    }
}

#[test]
fn bracket_minus_one_sets_is_literal_minus_one() {
    match only_statement("[-1]=5") {
        Statement::ArrayAssignment { is_literal_minus_one, .. } => assert!(is_literal_minus_one),
        other => panic!("expected ArrayAssignment, got {:?}", other),
    }
}

#[test]
fn array_initialization_onto_stack_index_is_rejected() {
    assert!(parse_program("[-1]=1,2\n").is_err());
}

#[test]
fn compare_and_swap_expression_parses_expected_and_new_value() {
    match only_statement("A=<&0,1>") {
        Statement::Assignment { expr: Expr::CompareAndSwap { expected, new_value }, .. } => {
            assert_eq!(*expected, Expr::NumericLiteral(0));
            assert_eq!(*new_value, Expr::NumericLiteral(1));
        }
        other => panic!("expected Assignment with CompareAndSwap, got {:?}", other),
    }
}

#[test]
fn comment_after_statement_is_ignored() {
    match only_statement("A=1 : set A to one") {
        Statement::Assignment { var, .. } => assert_eq!(var, 'A'),
        other => panic!("expected Assignment, got {:?}", other),
    }
}

#[test]
fn halt_and_return_and_frame_wait_forms() {
    assert!(matches!(only_statement("#=-1"), Statement::Halt { .. }));
    assert!(matches!(only_statement("#=!"), Statement::Return { .. }));
    assert!(matches!(only_statement("#=`"), Statement::WaitForNextFrame { .. }));
}

#[test]
fn peek_poke_and_io_expressions() {
    match only_statement("`=7") {
        Statement::Poke { expr, .. } => assert_eq!(expr, Expr::NumericLiteral(7)),
        other => panic!("expected Poke, got {:?}", other),
    }
    match only_statement("A=`") {
        Statement::Assignment { expr, .. } => assert_eq!(expr, Expr::Peek),
        other => panic!("expected Assignment, got {:?}", other),
    }
    match only_statement("$=65") {
        Statement::IoPut { expr, .. } => assert_eq!(expr, Expr::NumericLiteral(65)),
        other => panic!("expected IoPut, got {:?}", other),
    }
}
