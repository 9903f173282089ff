//! Interactive repository selection as a pure state machine.
//!
//! Terminal handling lives in the CLI: it renders the projections exposed
//! here and feeds key presses back as [`Input`] values. Every transition is
//! synchronous, so the whole flow can be driven from a script in tests.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use gitshift_types::{Repository, TransferTask};

use crate::error::ValidationError;
use crate::validate::{validate_name, NameRules, Validator};

/// Items shown per page.
pub const PAGE_SIZE: usize = 15;

/// Selector state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Moving the cursor and toggling items.
    Browsing,
    /// Asking for a target name for each selected item in turn.
    Renaming,
    /// Selection finished; tasks are available.
    Committed,
    /// Operator quit; nothing runs.
    Aborted,
}

/// Operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Cursor up one item.
    Up,
    /// Cursor down one item.
    Down,
    /// Previous page.
    PrevPage,
    /// Next page.
    NextPage,
    /// Flip the item under the cursor.
    Toggle,
    /// Select every item.
    SelectAll,
    /// Deselect every item.
    DeselectAll,
    /// Finish browsing and rename the selection one by one.
    Confirm,
    /// Finish browsing and keep every original name.
    ConfirmWithoutRename,
    /// Answer to the rename prompt; blank keeps the original name.
    Submit(String),
    /// Abort the session.
    Quit,
}

/// One row of the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorItem {
    /// The repository.
    pub repository: Repository,
    /// Whether it will be migrated.
    pub selected: bool,
    /// Target name, when different from the repository name.
    pub renamed_to: Option<String>,
}

impl SelectorItem {
    /// Name the repository will get on the destination.
    pub fn target_name(&self) -> &str {
        self.renamed_to
            .as_deref()
            .unwrap_or(&self.repository.name)
    }
}

/// Final outcome of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Tasks in browsing order.
    Committed(Vec<TransferTask>),
    /// Operator quit.
    Aborted,
}

/// Where the selector gets its next input from.
pub trait InputSource {
    /// Renders `selector` as needed and returns the next input.
    fn next_input(&mut self, selector: &Selector) -> std::io::Result<Input>;
}

/// Answers whether the destination already has a repository of that name.
pub type ExistsCheck = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Selection state for one interactive session.
#[derive(Clone)]
pub struct Selector {
    items: Vec<SelectorItem>,
    rules: NameRules,
    phase: Phase,
    cursor: usize,
    page: usize,
    selected_count: usize,
    rename_queue: Vec<usize>,
    rename_pos: usize,
    error: Option<ValidationError>,
    exists: Option<ExistsCheck>,
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector")
            .field("items", &self.items.len())
            .field("phase", &self.phase)
            .field("cursor", &self.cursor)
            .field("selected_count", &self.selected_count)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl Selector {
    /// Starts browsing `repositories`: own repositories first, then by full
    /// name, with own repositories preselected.
    pub fn new(repositories: Vec<Repository>, rules: NameRules) -> Self {
        let mut items: Vec<SelectorItem> = repositories
            .into_iter()
            .map(|repository| SelectorItem {
                selected: repository.is_mine,
                repository,
                renamed_to: None,
            })
            .collect();
        items.sort_by(|a, b| {
            b.repository
                .is_mine
                .cmp(&a.repository.is_mine)
                .then_with(|| a.repository.full_name().cmp(&b.repository.full_name()))
        });
        let selected_count = items.iter().filter(|i| i.selected).count();

        Self {
            items,
            rules,
            phase: Phase::Browsing,
            cursor: 0,
            page: 0,
            selected_count,
            rename_queue: Vec::new(),
            rename_pos: 0,
            error: None,
            exists: None,
        }
    }

    /// Rejects renames onto names the destination already has. Keeping the
    /// original name is always allowed, so re-runs still skip.
    #[must_use]
    pub fn with_exists_check<F>(mut self, exists: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.exists = Some(Arc::new(exists));
        self
    }

    /// Drives the session until it commits or aborts.
    pub fn run<S: InputSource>(mut self, source: &mut S) -> std::io::Result<Selection> {
        loop {
            match self.phase {
                Phase::Committed => return Ok(Selection::Committed(self.into_tasks())),
                Phase::Aborted => return Ok(Selection::Aborted),
                Phase::Browsing | Phase::Renaming => {
                    let input = source.next_input(&self)?;
                    self.handle(input);
                }
            }
        }
    }

    /// Applies one input and returns the resulting phase.
    pub fn handle(&mut self, input: Input) -> Phase {
        match self.phase {
            Phase::Browsing => self.browse(input),
            Phase::Renaming => self.rename(input),
            Phase::Committed | Phase::Aborted => {}
        }
        self.phase
    }

    fn browse(&mut self, input: Input) {
        let len = self.items.len();
        match input {
            Input::Up if len > 0 => self.move_to((self.cursor + len - 1) % len),
            Input::Down if len > 0 => self.move_to((self.cursor + 1) % len),
            Input::PrevPage if len > 0 => {
                let pages = self.page_count();
                self.move_to(((self.page + pages - 1) % pages) * PAGE_SIZE);
            }
            Input::NextPage if len > 0 => {
                let pages = self.page_count();
                self.move_to(((self.page + 1) % pages) * PAGE_SIZE);
            }
            Input::Toggle => {
                if let Some(item) = self.items.get_mut(self.cursor) {
                    item.selected = !item.selected;
                    if item.selected {
                        self.selected_count += 1;
                    } else {
                        self.selected_count -= 1;
                    }
                }
            }
            Input::SelectAll => self.set_all(true),
            Input::DeselectAll => self.set_all(false),
            Input::Confirm if self.selected_count > 0 => {
                self.rename_queue = self
                    .items
                    .iter()
                    .enumerate()
                    .filter(|(_, item)| item.selected)
                    .map(|(idx, _)| idx)
                    .collect();
                self.rename_pos = 0;
                self.error = None;
                self.phase = Phase::Renaming;
            }
            Input::ConfirmWithoutRename if self.selected_count > 0 => {
                for item in &mut self.items {
                    item.renamed_to = None;
                }
                let (queue, first_error) = self.unusable_names();
                if let Some(error) = first_error {
                    self.rename_queue = queue;
                    self.rename_pos = 0;
                    self.error = Some(error);
                    self.phase = Phase::Renaming;
                } else {
                    self.phase = Phase::Committed;
                }
            }
            Input::Quit => self.phase = Phase::Aborted,
            _ => {}
        }
    }

    fn rename(&mut self, input: Input) {
        match input {
            Input::Submit(answer) => {
                let Some(&idx) = self.rename_queue.get(self.rename_pos) else {
                    self.phase = Phase::Committed;
                    return;
                };
                let original = self.items[idx].repository.name.clone();
                let candidate = if answer.trim().is_empty() {
                    original.clone()
                } else {
                    answer
                };
                let validator =
                    Validator::new(self.rules.clone()).with_taken(self.claimed_names());
                let name = match validator.validate(&candidate) {
                    Ok(name) => name,
                    Err(e) => {
                        self.error = Some(e);
                        return;
                    }
                };
                if !name.eq_ignore_ascii_case(&original)
                    && self.exists.as_ref().is_some_and(|exists| exists(&name))
                {
                    self.error = Some(ValidationError::ExistsOnDestination(name));
                    return;
                }
                self.items[idx].renamed_to = (name != original).then_some(name);
                self.error = None;
                self.rename_pos += 1;
                if self.rename_pos >= self.rename_queue.len() {
                    self.phase = Phase::Committed;
                }
            }
            Input::Quit => self.phase = Phase::Aborted,
            _ => {}
        }
    }

    /// Target names of selected items that no longer wait for an answer.
    fn claimed_names(&self) -> Vec<String> {
        let pending = self.rename_queue.get(self.rename_pos..).unwrap_or_default();
        self.items
            .iter()
            .enumerate()
            .filter(|(idx, item)| item.selected && !pending.contains(idx))
            .map(|(_, item)| item.target_name().to_string())
            .collect()
    }

    /// Selected items whose original name is invalid or repeats an earlier
    /// one, with the first reason.
    fn unusable_names(&self) -> (Vec<usize>, Option<ValidationError>) {
        let mut seen = HashSet::new();
        let mut queue = Vec::new();
        let mut first = None;
        for (idx, item) in self.items.iter().enumerate().filter(|(_, i)| i.selected) {
            let name = &item.repository.name;
            let problem = match validate_name(name, &self.rules) {
                Err(e) => Some(e),
                Ok(valid) if !seen.insert(valid.to_lowercase()) => {
                    Some(ValidationError::Collision(valid))
                }
                Ok(_) => None,
            };
            if let Some(problem) = problem {
                queue.push(idx);
                first.get_or_insert(problem);
            }
        }
        (queue, first)
    }

    fn move_to(&mut self, cursor: usize) {
        self.cursor = cursor;
        self.page = cursor / PAGE_SIZE;
    }

    fn set_all(&mut self, selected: bool) {
        for item in &mut self.items {
            item.selected = selected;
        }
        self.selected_count = if selected { self.items.len() } else { 0 };
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Every item in display order.
    pub fn items(&self) -> &[SelectorItem] {
        &self.items
    }

    /// Items on the current page.
    pub fn page_items(&self) -> &[SelectorItem] {
        let start = (self.page * PAGE_SIZE).min(self.items.len());
        let end = (start + PAGE_SIZE).min(self.items.len());
        &self.items[start..end]
    }

    /// Zero-based current page.
    pub fn page(&self) -> usize {
        self.page
    }

    /// Number of pages, at least one.
    pub fn page_count(&self) -> usize {
        self.items.len().div_ceil(PAGE_SIZE).max(1)
    }

    /// Absolute cursor position.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Cursor position within the current page.
    pub fn cursor_in_page(&self) -> usize {
        self.cursor - self.page * PAGE_SIZE
    }

    /// Number of selected items.
    pub fn selected_count(&self) -> usize {
        self.selected_count
    }

    /// Item being renamed with its one-based position and the total.
    pub fn rename_item(&self) -> Option<(usize, usize, &SelectorItem)> {
        if self.phase != Phase::Renaming {
            return None;
        }
        let idx = *self.rename_queue.get(self.rename_pos)?;
        Some((self.rename_pos + 1, self.rename_queue.len(), &self.items[idx]))
    }

    /// Why the last rename answer was rejected.
    pub fn error(&self) -> Option<&ValidationError> {
        self.error.as_ref()
    }

    /// Tasks for the selected items, once committed.
    pub fn tasks(&self) -> Option<Vec<TransferTask>> {
        (self.phase == Phase::Committed).then(|| {
            self.items
                .iter()
                .filter(|item| item.selected)
                .map(|item| {
                    TransferTask::renamed(item.repository.clone(), item.target_name())
                })
                .collect()
        })
    }

    /// Consumes the selector and returns its tasks; empty unless committed.
    pub fn into_tasks(self) -> Vec<TransferTask> {
        self.tasks().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::VecDeque;

    struct Script(VecDeque<Input>);

    impl InputSource for Script {
        fn next_input(&mut self, _selector: &Selector) -> std::io::Result<Input> {
            Ok(self.0.pop_front().unwrap_or(Input::Quit))
        }
    }

    fn repos(n: usize) -> Vec<Repository> {
        (0..n)
            .map(|i| Repository::new("org", format!("repo-{i:02}")))
            .collect()
    }

    #[test]
    fn test_initial_order_and_selection() {
        let selector = Selector::new(
            vec![
                Repository::new("bob", "lib"),
                Repository::new("alice", "zeta").with_mine(true),
                Repository::new("acme", "site"),
                Repository::new("alice", "app").with_mine(true),
            ],
            NameRules::GITHUB,
        );
        let names: Vec<String> = selector
            .items()
            .iter()
            .map(|i| i.repository.full_name())
            .collect();
        assert_eq!(names, vec!["alice/app", "alice/zeta", "acme/site", "bob/lib"]);
        assert_eq!(selector.selected_count(), 2);
        assert_eq!(selector.phase(), Phase::Browsing);
        assert_eq!((selector.cursor(), selector.page()), (0, 0));
    }

    #[test]
    fn test_alice_bob_scenario() {
        let selector = Selector::new(
            vec![
                Repository::new("alice", "app").with_mine(true),
                Repository::new("bob", "lib"),
            ],
            NameRules::GITHUB,
        );
        assert!(selector.items()[0].selected);
        assert!(!selector.items()[1].selected);

        let mut script = Script(VecDeque::from([Input::ConfirmWithoutRename]));
        let Selection::Committed(tasks) = selector.run(&mut script).unwrap() else {
            panic!("session should commit");
        };
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].source.full_name(), "alice/app");
        assert_eq!(tasks[0].target_name, "app");
    }

    #[test]
    fn test_paging_wraps() {
        let mut selector = Selector::new(repos(20), NameRules::GITHUB);
        assert_eq!(selector.page_count(), 2);
        assert_eq!(selector.page_items().len(), 15);

        selector.handle(Input::Up);
        assert_eq!((selector.cursor(), selector.page()), (19, 1));
        assert_eq!(selector.page_items().len(), 5);
        assert_eq!(selector.cursor_in_page(), 4);

        selector.handle(Input::Down);
        assert_eq!((selector.cursor(), selector.page()), (0, 0));

        for _ in 0..15 {
            selector.handle(Input::Down);
        }
        assert_eq!((selector.cursor(), selector.page()), (15, 1));

        selector.handle(Input::NextPage);
        assert_eq!((selector.cursor(), selector.page()), (0, 0));
        selector.handle(Input::PrevPage);
        assert_eq!((selector.cursor(), selector.page()), (15, 1));
    }

    #[test]
    fn test_confirm_without_selection_is_noop() {
        let mut selector = Selector::new(repos(3), NameRules::GITHUB);
        assert_eq!(selector.handle(Input::Confirm), Phase::Browsing);
        assert_eq!(selector.handle(Input::ConfirmWithoutRename), Phase::Browsing);
        assert!(selector.tasks().is_none());
    }

    #[test]
    fn test_rename_flow() {
        let mut selector = Selector::new(repos(3), NameRules::GITHUB);
        selector.handle(Input::SelectAll);
        assert_eq!(selector.handle(Input::Confirm), Phase::Renaming);

        let (k, n, item) = selector.rename_item().unwrap();
        assert_eq!((k, n, item.repository.name.as_str()), (1, 3, "repo-00"));

        selector.handle(Input::Submit("My Repo!".into()));
        assert_eq!(selector.error(), Some(&ValidationError::InvalidCharacter(' ')));
        assert_eq!(selector.rename_item().unwrap().0, 1);

        selector.handle(Input::Submit("first".into()));
        assert!(selector.error().is_none());

        selector.handle(Input::Submit("FIRST".into()));
        assert_eq!(selector.error(), Some(&ValidationError::Collision("FIRST".into())));
        assert_eq!(selector.rename_item().unwrap().0, 2);
        selector.handle(Input::Submit(String::new()));

        selector.handle(Input::Submit("repo-01".into()));
        assert!(matches!(selector.error(), Some(ValidationError::Collision(_))));
        assert_eq!(selector.handle(Input::Submit("repo-02".into())), Phase::Committed);

        let tasks = selector.into_tasks();
        let targets: Vec<&str> = tasks.iter().map(|t| t.target_name.as_str()).collect();
        assert_eq!(targets, vec!["first", "repo-01", "repo-02"]);
        assert!(tasks[0].is_renamed());
        assert!(!tasks[2].is_renamed());
    }

    fn same_name_pair() -> Selector {
        let mut selector = Selector::new(
            vec![
                Repository::new("alice", "app").with_mine(true),
                Repository::new("acme", "app"),
            ],
            NameRules::GITHUB,
        );
        selector.handle(Input::SelectAll);
        selector
    }

    #[test]
    fn test_blank_answer_cannot_keep_a_taken_name() {
        let mut selector = same_name_pair();
        selector.handle(Input::Confirm);

        selector.handle(Input::Submit(String::new()));
        assert!(selector.error().is_none());

        assert_eq!(selector.handle(Input::Submit("  ".into())), Phase::Renaming);
        assert_eq!(selector.error(), Some(&ValidationError::Collision("app".into())));
        let (_, _, item) = selector.rename_item().unwrap();
        assert_eq!(item.repository.full_name(), "acme/app");

        assert_eq!(selector.handle(Input::Submit("acme-app".into())), Phase::Committed);
        let targets: Vec<String> = selector
            .into_tasks()
            .into_iter()
            .map(|t| t.target_name)
            .collect();
        assert_eq!(targets, vec!["app", "acme-app"]);
    }

    #[test]
    fn test_skipping_rename_asks_only_for_clashing_names() {
        let mut selector = same_name_pair();

        assert_eq!(selector.handle(Input::ConfirmWithoutRename), Phase::Renaming);
        assert_eq!(selector.error(), Some(&ValidationError::Collision("app".into())));
        let (k, n, item) = selector.rename_item().unwrap();
        assert_eq!((k, n, item.repository.full_name()), (1, 1, "acme/app".to_string()));

        selector.handle(Input::Submit(String::new()));
        assert_eq!(selector.phase(), Phase::Renaming);

        assert_eq!(selector.handle(Input::Submit("app-fork".into())), Phase::Committed);
        let targets: Vec<String> = selector
            .into_tasks()
            .into_iter()
            .map(|t| t.target_name)
            .collect();
        assert_eq!(targets, vec!["app", "app-fork"]);
    }

    #[test]
    fn test_skipping_rename_asks_for_names_the_destination_refuses() {
        let mut selector = Selector::new(
            vec![Repository::new("alice", "notes.wiki").with_mine(true)],
            NameRules::GITEA,
        );
        assert_eq!(selector.handle(Input::ConfirmWithoutRename), Phase::Renaming);
        assert_eq!(selector.error(), Some(&ValidationError::Reserved(".wiki".into())));
        assert_eq!(selector.handle(Input::Submit("notes".into())), Phase::Committed);
    }

    #[test]
    fn test_rename_onto_existing_destination_repository_is_rejected() {
        let mut selector = Selector::new(
            vec![
                Repository::new("alice", "app").with_mine(true),
                Repository::new("alice", "lib").with_mine(true),
            ],
            NameRules::GITHUB,
        )
        .with_exists_check(|name| matches!(name, "app" | "legacy"));
        selector.handle(Input::Confirm);

        selector.handle(Input::Submit(String::new()));
        assert!(selector.error().is_none());

        selector.handle(Input::Submit("legacy".into()));
        assert_eq!(
            selector.error(),
            Some(&ValidationError::ExistsOnDestination("legacy".into()))
        );
        assert_eq!(selector.handle(Input::Submit("lib2".into())), Phase::Committed);
    }

    #[test]
    fn test_quit_from_renaming_aborts() {
        let selector = Selector::new(repos(2), NameRules::GITHUB);
        let mut script = Script(VecDeque::from([
            Input::SelectAll,
            Input::Confirm,
            Input::Quit,
        ]));
        assert_eq!(selector.run(&mut script).unwrap(), Selection::Aborted);
    }

    #[test]
    fn test_empty_list() {
        let mut selector = Selector::new(Vec::new(), NameRules::GITHUB);
        selector.handle(Input::Down);
        selector.handle(Input::NextPage);
        selector.handle(Input::Toggle);
        assert_eq!(selector.selected_count(), 0);
        assert!(selector.page_items().is_empty());
        assert_eq!(selector.handle(Input::Quit), Phase::Aborted);
    }

    fn browse_input() -> impl Strategy<Value = Input> {
        prop_oneof![
            Just(Input::Up),
            Just(Input::Down),
            Just(Input::PrevPage),
            Just(Input::NextPage),
            Just(Input::Toggle),
            Just(Input::SelectAll),
            Just(Input::DeselectAll),
        ]
    }

    proptest! {
        #[test]
        fn prop_selected_count_matches_flags(
            mine in proptest::collection::vec(any::<bool>(), 0..40),
            inputs in proptest::collection::vec(browse_input(), 0..80),
        ) {
            let repos: Vec<Repository> = mine
                .iter()
                .enumerate()
                .map(|(i, m)| Repository::new("o", format!("r{i}")).with_mine(*m))
                .collect();
            let mut selector = Selector::new(repos, NameRules::GITHUB);
            for input in inputs {
                selector.handle(input);
                let counted = selector.items().iter().filter(|i| i.selected).count();
                prop_assert_eq!(selector.selected_count(), counted);
                prop_assert!(selector.page() < selector.page_count());
            }
        }

        #[test]
        fn prop_committed_targets_are_unique(
            names in proptest::collection::vec("[ab]{1,2}", 1..12),
            answers in proptest::collection::vec("[ab]{0,2}", 0..40),
        ) {
            let repos: Vec<Repository> = names
                .iter()
                .enumerate()
                .map(|(i, n)| Repository::new(format!("o{i}"), n.clone()))
                .collect();
            let mut selector = Selector::new(repos, NameRules::GITHUB);
            selector.handle(Input::SelectAll);
            selector.handle(Input::ConfirmWithoutRename);
            for answer in answers {
                selector.handle(Input::Submit(answer));
            }
            if let Some(tasks) = selector.tasks() {
                let unique: HashSet<String> =
                    tasks.iter().map(|t| t.target_name.to_lowercase()).collect();
                prop_assert_eq!(unique.len(), tasks.len());
            }
        }

        #[test]
        fn prop_own_items_sort_first(
            entries in proptest::collection::vec(("[a-d]{1,3}", "[a-z]{1,4}", any::<bool>()), 0..30),
        ) {
            let repos: Vec<Repository> = entries
                .iter()
                .map(|(o, n, m)| Repository::new(o.clone(), n.clone()).with_mine(*m))
                .collect();
            let selector = Selector::new(repos, NameRules::GITHUB);
            for pair in selector.items().windows(2) {
                let (a, b) = (&pair[0].repository, &pair[1].repository);
                prop_assert!(a.is_mine >= b.is_mine);
                if a.is_mine == b.is_mine {
                    prop_assert!(a.full_name() <= b.full_name());
                }
            }
        }
    }
}
