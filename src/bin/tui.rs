use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::NaiveDateTime;
use crossterm::{event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind}, execute, terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen}};
use ratatui::{backend::CrosstermBackend, Terminal, widgets::{Block, Borders, List, ListItem, Paragraph, ListState}, layout::{Layout, Constraint, Direction}, style::{Style, Modifier, Color}};

use todo_api::{
    application::todo_service::{TodoService, TodoServiceImpl},
    config::Config,
    domain::{repository::TodoRepository, todo::{NewTodo, Todo, TodoId, UpdateTodo}},
    infrastructure::sqlite_repo::SqliteTodoRepository,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    let repo = SqliteTodoRepository::connect(&config.database_url).await?;
    repo.init().await?;
    let service = TodoServiceImpl::new(repo);

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, service, &config.database_url).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    res
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode { View, Create, Edit }

#[derive(Clone, Copy, PartialEq, Eq)]
enum Filter { All, Open, Completed }

impl Filter {
    fn label(self) -> &'static str {
        match self { Filter::All => "All", Filter::Open => "Open", Filter::Completed => "Completed" }
    }

    fn next(self) -> Self {
        match self { Filter::All => Filter::Open, Filter::Open => Filter::Completed, Filter::Completed => Filter::All }
    }

    fn includes(self, todo: &Todo) -> bool {
        match self { Filter::All => true, Filter::Open => !todo.completed, Filter::Completed => todo.completed }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ActiveField { Title, Description }

struct App<R: TodoRepository> {
    service: TodoServiceImpl<R>,
    items: Vec<Todo>,
    selected: usize,
    last_tick: Instant,
    mode: Mode,
    list_state: ListState,
    filter: Filter,
    filtered_indices: Vec<usize>,
    field: ActiveField,
    draft_title: String,
    draft_desc: String,
    notice: Option<String>,
}

impl<R: TodoRepository> App<R> {
    fn new(service: TodoServiceImpl<R>) -> Self {
        App { service, items: vec![], selected: 0, last_tick: Instant::now(), mode: Mode::View, list_state: ListState::default(), filter: Filter::All, filtered_indices: Vec::new(), field: ActiveField::Title, draft_title: String::new(), draft_desc: String::new(), notice: None }
    }

    async fn load(&mut self) -> Result<()> {
        self.items = self.service.list().await?;
        self.recompute_filtered();
        Ok(())
    }

    fn recompute_filtered(&mut self) {
        let filter = self.filter;
        self.filtered_indices = self.items.iter().enumerate().filter(|(_, t)| filter.includes(t)).map(|(i, _)| i).collect();
        // Clamp selection within filtered bounds
        let len = self.filtered_indices.len();
        if self.selected >= len { self.selected = len.saturating_sub(1); }
        self.sync_highlight();
    }

    /// Keeps the highlighted row on the item that Enter/e/d act on.
    fn sync_highlight(&mut self) {
        if self.filtered_indices.is_empty() { self.list_state.select(None); } else { self.list_state.select(Some(self.selected)); }
    }

    fn move_up(&mut self) {
        if self.selected > 0 { self.selected -= 1; }
        self.sync_highlight();
    }

    fn move_down(&mut self) {
        if self.selected + 1 < self.filtered_indices.len() { self.selected += 1; }
        self.sync_highlight();
    }

    fn current(&self) -> Option<&Todo> {
        self.filtered_indices.get(self.selected).and_then(|&idx| self.items.get(idx))
    }

    fn reset_drafts(&mut self) {
        self.mode = Mode::View;
        self.draft_title.clear();
        self.draft_desc.clear();
    }

    fn report(&mut self, result: Result<()>) {
        self.notice = result.err().map(|e| format!("error: {e}"));
    }

    async fn toggle_selected(&mut self) -> Result<()> {
        let Some((id, completed)) = self.current().map(|t| (t.id(), t.completed)) else { return Ok(()) };
        self.service.update(id, UpdateTodo::completed(!completed)).await?;
        Ok(())
    }

    async fn delete_selected(&mut self) -> Result<()> {
        let Some(id) = self.current().map(Todo::id) else { return Ok(()) };
        self.service.delete(id).await?;
        self.move_up();
        Ok(())
    }

    async fn save_draft(&mut self) -> Result<()> {
        let desc = self.draft_desc.trim();
        let desc_opt = if desc.is_empty() { None } else { Some(desc.to_string()) };
        match self.mode {
            Mode::Create => {
                let record = NewTodo { title: Some(self.draft_title.trim().to_string()), description: desc_opt, ..NewTodo::default() };
                self.service.create(record).await?;
            }
            Mode::Edit => {
                let Some(id) = self.current().map(Todo::id) else { return Ok(()) };
                let update = UpdateTodo { title: Some(self.draft_title.trim().to_string()), description: Some(desc_opt), ..UpdateTodo::default() };
                update_existing(&self.service, id, update).await?;
            }
            Mode::View => {}
        }
        Ok(())
    }

    fn draft_mut(&mut self) -> &mut String {
        match self.field { ActiveField::Title => &mut self.draft_title, ActiveField::Description => &mut self.draft_desc }
    }
}

async fn update_existing<R: TodoRepository>(service: &TodoServiceImpl<R>, id: TodoId, update: UpdateTodo) -> Result<()> {
    if service.update(id, update).await?.is_none() {
        anyhow::bail!("todo {id} no longer exists");
    }
    Ok(())
}

fn format_ts(ts: Option<NaiveDateTime>) -> String {
    ts.map(|t| t.format("%Y-%m-%d %H:%M").to_string()).unwrap_or_else(|| "-".to_string())
}

async fn run_app<R: TodoRepository>(terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>, service: TodoServiceImpl<R>, database_url: &str) -> Result<()> {
    let tick_rate = Duration::from_millis(200);
    let mut app = App::new(service);
    app.load().await?;

    loop {
        terminal.draw(|f| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(3),
                    Constraint::Min(1),
                    Constraint::Length(3),
                ])
                .split(f.size());

            let header = Paragraph::new("Todos (Enter: toggle, n: new, e: edit, d: delete, f: filter, q: quit)  |  New/Edit: Tab switches field, Enter saves, Esc cancels")
                .block(Block::default().borders(Borders::ALL).title("todo-tui"));
            f.render_widget(header, chunks[0]);

            let middle = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                .split(chunks[1]);

            let list_items: Vec<ListItem> = app.filtered_indices.iter().filter_map(|&idx| app.items.get(idx)).map(|t| {
                let mark = if t.completed { "[x]" } else { "[ ]" };
                ListItem::new(format!("{} {}", mark, t.title))
            }).collect();
            let list = List::new(list_items)
                .block(Block::default().borders(Borders::ALL).title(format!("items [{}]", app.filter.label())))
                .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD | Modifier::REVERSED))
                .highlight_symbol(">> ");
            // Keep list_state selection in sync with current index
            app.sync_highlight();
            f.render_stateful_widget(list, middle[0], &mut app.list_state);

            let detail = match app.current() {
                Some(t) => format!(
                    "#{} {}\n\nCompleted: {}\nCreated:   {}\nDue:       {}\n\nDescription:\n{}",
                    t.id(),
                    t.title,
                    if t.completed { "yes" } else { "no" },
                    format_ts(Some(t.created_at())),
                    format_ts(t.due_at),
                    t.description.as_deref().unwrap_or("(no description)"),
                ),
                None => String::new(),
            };
            let details = Paragraph::new(detail)
                .block(Block::default().borders(Borders::ALL).title("details"));
            f.render_widget(details, middle[1]);

            let field_label = match app.field { ActiveField::Title => "Title", ActiveField::Description => "Desc" };
            let field_value = match app.field { ActiveField::Title => &app.draft_title, ActiveField::Description => &app.draft_desc };
            let footer_text = match (app.mode, &app.notice) {
                (Mode::View, Some(notice)) => notice.clone(),
                (Mode::View, None) => format!("DATABASE_URL={}  |  Filter=[{}]", database_url, app.filter.label()),
                (Mode::Create, _) => format!("Create: {}: {}_", field_label, field_value),
                (Mode::Edit, _) => format!("Edit: {}: {}_", field_label, field_value),
            };
            let footer = Paragraph::new(footer_text)
                .block(Block::default().borders(Borders::ALL).title(match app.mode { Mode::View => "info", Mode::Create => "create", Mode::Edit => "edit" }));
            f.render_widget(footer, chunks[2]);
        })?;

        let timeout = tick_rate.saturating_sub(app.last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                // Only act on key presses; ignore repeats and releases to prevent duplicate input
                if key.kind != KeyEventKind::Press { continue; }
                match app.mode {
                    Mode::View => match key.code {
                        KeyCode::Char('q') => break,
                        KeyCode::Up => app.move_up(),
                        KeyCode::Down => app.move_down(),
                        KeyCode::Enter => {
                            let res = app.toggle_selected().await;
                            app.report(res);
                            app.load().await?;
                        }
                        KeyCode::Char('n') => {
                            app.mode = Mode::Create;
                            app.field = ActiveField::Title;
                            app.draft_title.clear();
                            app.draft_desc.clear();
                        }
                        KeyCode::Char('e') => {
                            if let Some((title, desc)) = app.current().map(|t| (t.title.clone(), t.description.clone().unwrap_or_default())) {
                                app.mode = Mode::Edit;
                                app.field = ActiveField::Title;
                                app.draft_title = title;
                                app.draft_desc = desc;
                            }
                        }
                        KeyCode::Char('d') => {
                            let res = app.delete_selected().await;
                            app.report(res);
                            app.load().await?;
                        }
                        KeyCode::Char('f') => {
                            app.filter = app.filter.next();
                            app.recompute_filtered();
                        }
                        _ => {}
                    },
                    Mode::Create | Mode::Edit => match key.code {
                        KeyCode::Esc => app.reset_drafts(),
                        KeyCode::Enter => {
                            let res = app.save_draft().await;
                            app.report(res);
                            app.reset_drafts();
                            app.load().await?;
                        }
                        KeyCode::Backspace => { app.draft_mut().pop(); }
                        KeyCode::Char(c) => app.draft_mut().push(c),
                        KeyCode::Tab => { app.field = match app.field { ActiveField::Title => ActiveField::Description, ActiveField::Description => ActiveField::Title }; }
                        _ => {}
                    },
                }
            }
        }
        if app.last_tick.elapsed() >= tick_rate {
            app.last_tick = Instant::now();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn app_with(titles: &[&str]) -> App<SqliteTodoRepository> {
        let repo = SqliteTodoRepository::connect("sqlite::memory:").await.unwrap();
        repo.init().await.unwrap();
        let service = TodoServiceImpl::new(repo);
        for title in titles {
            service.create(NewTodo::new(*title)).await.unwrap();
        }
        let mut app = App::new(service);
        app.load().await.unwrap();
        app
    }

    #[tokio::test]
    async fn highlight_follows_selection() {
        let mut app = app_with(&["one", "two", "three"]).await;
        assert_eq!(app.list_state.selected(), Some(0));
        app.move_down();
        assert_eq!(app.list_state.selected(), Some(1));
        assert_eq!(app.current().map(|t| t.title.as_str()), Some("two"));
        app.move_down();
        app.move_down();
        assert_eq!(app.list_state.selected(), Some(2));
        app.move_up();
        assert_eq!(app.list_state.selected(), Some(1));
    }

    #[tokio::test]
    async fn delete_acts_on_highlighted_row() {
        let mut app = app_with(&["one", "two", "three"]).await;
        app.move_down();
        app.delete_selected().await.unwrap();
        app.load().await.unwrap();
        let titles: Vec<_> = app.items.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["one", "three"]);
        assert_eq!(app.list_state.selected(), Some(app.selected));
    }

    #[tokio::test]
    async fn toggle_uses_filtered_row() {
        let mut app = app_with(&["one", "two"]).await;
        app.toggle_selected().await.unwrap();
        app.load().await.unwrap();
        app.filter = Filter::Open;
        app.recompute_filtered();
        assert_eq!(app.current().map(|t| t.title.as_str()), Some("two"));
        assert_eq!(app.list_state.selected(), Some(0));
        app.toggle_selected().await.unwrap();
        app.load().await.unwrap();
        assert!(app.items.iter().all(|t| t.completed));
        assert_eq!(app.list_state.selected(), None);
    }
}
