mod content;
mod expr;
mod handlers;
mod navigator;
mod visibility;

pub use content::{evaluate_content_ops, generate_icon_elements, update_context};
pub use expr::{
    evaluate_expr, evaluate_op, parse_expression, parse_op, parse_op_body, BinaryOp,
    EvalFailure, Evaluation, Expr, Op, Statement, UnaryOp,
};
pub use handlers::QuestInterpreter;
pub use navigator::{
    find_by_id, find_fallthrough_node, find_next_node, find_root_node, iterate_children,
    try_iterate_children,
};
pub use visibility::is_enabled;

#[cfg(test)]
mod tests;
