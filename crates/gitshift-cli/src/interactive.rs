//! Terminal rendering and key handling for the repository selector.

use std::io;

use console::{style, Key, Term};
use gitshift_migrate::{Input, InputSource, Phase, Selector};

use crate::output::DESCRIPTION_WIDTH;

/// Reads keys from the terminal and redraws the selector before each one.
pub struct TerminalInput {
    term: Term,
}

impl Default for TerminalInput {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalInput {
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
        }
    }

    fn render_browsing(&self, selector: &Selector) -> io::Result<()> {
        self.term.clear_screen()?;
        self.term.write_line(&format!(
            "{}  page {}/{}  {} selected",
            style("Select repositories to migrate").bold(),
            selector.page() + 1,
            selector.page_count(),
            style(selector.selected_count()).cyan()
        ))?;
        self.term.write_line("")?;

        for (row, item) in selector.page_items().iter().enumerate() {
            let pointer = if row == selector.cursor_in_page() {
                style(">").cyan().bold()
            } else {
                style(" ")
            };
            let checkbox = if item.selected { "[x]" } else { "[ ]" };
            let repo = &item.repository;
            let mut line = format!("{pointer} {checkbox} {}", repo.full_name());
            if repo.is_private {
                line.push_str(&format!(" {}", style("private").yellow()));
            }
            if !repo.is_mine {
                line.push_str(&format!(" {}", style("shared").dim()));
            }
            if let Some(description) = repo.short_description(DESCRIPTION_WIDTH) {
                line.push_str(&format!("  {}", style(description).dim()));
            }
            self.term.write_line(&line)?;
        }

        self.term.write_line("")?;
        self.term.write_line(
            &style("up/down move  left/right page  space toggle  a all  n none  enter confirm  q quit")
                .dim()
                .to_string(),
        )
    }

    fn render_renaming(&self, selector: &Selector) -> io::Result<()> {
        let Some((position, total, item)) = selector.rename_item() else {
            return Ok(());
        };
        if let Some(error) = selector.error() {
            self.term
                .write_line(&format!("{} {error}", style("Invalid name:").red()))?;
        } else {
            self.term.clear_screen()?;
        }
        self.term.write_line(&format!(
            "{} {position} of {total}: {}",
            style("Rename").bold(),
            item.repository.full_name()
        ))?;
        self.term.write_str(&format!(
            "New name (enter keeps '{}'): ",
            item.repository.name
        ))
    }

    fn confirm_rename(&self) -> io::Result<bool> {
        self.term.write_str("Rename any repositories? [y/N] ")?;
        let key = self.term.read_key()?;
        self.term.write_line("")?;
        Ok(matches!(key, Key::Char('y' | 'Y')))
    }
}

impl InputSource for TerminalInput {
    fn next_input(&mut self, selector: &Selector) -> io::Result<Input> {
        match selector.phase() {
            Phase::Browsing => {
                self.render_browsing(selector)?;
                loop {
                    let input = match self.term.read_key()? {
                        Key::ArrowUp | Key::Char('k') => Input::Up,
                        Key::ArrowDown | Key::Char('j') => Input::Down,
                        Key::ArrowLeft => Input::PrevPage,
                        Key::ArrowRight => Input::NextPage,
                        Key::Char(' ') => Input::Toggle,
                        Key::Char('a') => Input::SelectAll,
                        Key::Char('n') => Input::DeselectAll,
                        Key::Enter if selector.selected_count() == 0 => continue,
                        Key::Enter => {
                            if self.confirm_rename()? {
                                Input::Confirm
                            } else {
                                Input::ConfirmWithoutRename
                            }
                        }
                        Key::Char('q') | Key::Escape | Key::CtrlC => Input::Quit,
                        _ => continue,
                    };
                    return Ok(input);
                }
            }
            Phase::Renaming => {
                self.render_renaming(selector)?;
                let answer = self.term.read_line()?;
                Ok(Input::Submit(answer))
            }
            Phase::Committed | Phase::Aborted => Ok(Input::Quit),
        }
    }
}
