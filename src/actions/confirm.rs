//! 确认模式：shell 命令执行前询问用户，拒绝即跳过该条

use std::io::{BufRead, Write};

/// 执行前审批
pub trait Approver: Send + Sync {
    fn approve(&self, command: &str) -> bool;
}

/// 全部放行（自主模式）
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoApprove;

impl Approver for AutoApprove {
    fn approve(&self, _command: &str) -> bool {
        true
    }
}

/// 从标准输入读取 y/N
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinApprover;

impl Approver for StdinApprover {
    fn approve(&self, command: &str) -> bool {
        let mut stdout = std::io::stdout();
        let _ = write!(stdout, "\nWill execute: {}\nExecute? [y/N] ", command);
        let _ = stdout.flush();
        let mut line = String::new();
        if std::io::stdin().lock().read_line(&mut line).is_err() {
            return false;
        }
        is_yes(&line)
    }
}

fn is_yes(answer: &str) -> bool {
    answer.trim().to_lowercase().starts_with('y')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answers() {
        assert!(is_yes("y\n"));
        assert!(is_yes("  Yes"));
        assert!(!is_yes(""));
        assert!(!is_yes("n"));
        assert!(AutoApprove.approve("rm -rf /tmp/x"));
    }
}
