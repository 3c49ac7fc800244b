mod battle;
mod config;
mod presenter;
mod quiz;

use std::sync::Arc;

use battle::session::{BattleError, Timer};
use battle::{enqueue, BattleSession, Command, Event, ExhaustionPolicy, VirtualClock};
use config::Config;
use dotenv::dotenv;
use presenter::{Keyboard, RETRY};
use quiz::{ai_helper::QuestionGenerator, source::QuestionSource, table::QuestionTable};
use rand::{rngs::StdRng, SeedableRng};
use teloxide::{
    dispatching::dialogue::{ErasedStorage, InMemStorage, Storage},
    prelude::*,
    types::{ChatAction, KeyboardButton, KeyboardMarkup, KeyboardRemove},
};
use tokio::sync::Mutex;

type BattleDialogue = Dialogue<State, ErasedStorage<State>>;
type BoxError = Box<dyn std::error::Error + Send + Sync>;
type HandlerResult = Result<(), BoxError>;
type BattleStorage = Arc<ErasedStorage<State>>;
type Source = QuestionSource<QuestionGenerator>;

#[derive(Clone, Debug, Default)]
pub enum State {
    #[default]
    Start,
    ReceiveTopic,
    Battle {
        session: BattleSession,
    },
    Finished,
}

const RESTART_COMMAND: &str = "/restart";

/// Serializes dialogue writes between the handlers and the round timers,
/// which run in their own tasks.
#[derive(Clone, Default)]
struct StateLock(Arc<Mutex<()>>);

impl StateLock {
    async fn update(&self, dialogue: &BattleDialogue, state: State) -> HandlerResult {
        let _guard = self.0.lock().await;
        dialogue.update(state).await?;
        Ok(())
    }

    /// Stores `state` only while the chat is still playing run `run_id`.
    /// Returns whether it was stored.
    async fn update_run(
        &self,
        dialogue: &BattleDialogue,
        run_id: u64,
        state: State,
    ) -> Result<bool, BoxError> {
        let _guard = self.0.lock().await;
        let running = matches!(
            dialogue.get().await?,
            Some(State::Battle { session }) if session.run_id() == run_id
        );
        if running {
            dialogue.update(state).await?;
        }
        Ok(running)
    }
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    pretty_env_logger::init();
    log::info!("Starting quiz boss bot...");

    let config = Config::from_env().expect("Invalid configuration");

    let table = QuestionTable::open(&config.questions_path).unwrap_or_else(|e| {
        panic!(
            "Failed to load questions from '{}': {e}",
            config.questions_path.display()
        )
    });
    log::info!(
        "Question table loaded: {}",
        table.topics().collect::<Vec<_>>().join(", ")
    );

    let generator = match &config.groq_api_key {
        Some(key) => Some(
            QuestionGenerator::new(key, config.groq_api_url.clone(), config.request_timeout)
                .expect("Unable to set up the question generator"),
        ),
        None => {
            log::warn!("GROQ_API_KEY is not set, every run will use the static question table");
            None
        }
    };
    let source: Arc<Source> = Arc::new(QuestionSource::new(generator, table));

    let bot = Bot::from_env();
    let storage: BattleStorage = InMemStorage::<State>::new().erase();
    let lock = StateLock::default();

    Dispatcher::builder(
        bot,
        Update::filter_message()
            .enter_dialogue::<Message, ErasedStorage<State>, State>()
            .branch(
                dptree::filter(|msg: Message| msg.text() == Some(RESTART_COMMAND)).endpoint(restart),
            )
            .branch(dptree::case![State::Start].endpoint(start))
            .branch(dptree::case![State::ReceiveTopic].endpoint(receive_topic))
            .branch(dptree::case![State::Battle { session }].endpoint(battle))
            .branch(dptree::case![State::Finished].endpoint(finished)),
    )
    .dependencies(dptree::deps![storage, lock, source, config.pool_policy])
    .enable_ctrlc_handler()
    .build()
    .dispatch()
    .await;
}

const GREETING_TEXT: &str = "Welcome, challenger! Four monsters stand between you and glory. \
Every right answer is a blow against them, every wrong one is a blow against you.";

async fn start(
    bot: Bot,
    dialogue: BattleDialogue,
    lock: StateLock,
    source: Arc<Source>,
    msg: Message,
) -> HandlerResult {
    bot.send_message(msg.chat.id, GREETING_TEXT).await?;

    ask_for_topic(&bot, &dialogue, &lock, &source, msg.chat.id).await
}

async fn restart(
    bot: Bot,
    dialogue: BattleDialogue,
    lock: StateLock,
    source: Arc<Source>,
    msg: Message,
) -> HandlerResult {
    log::info!("Chat {} restarted", msg.chat.id.0);

    ask_for_topic(&bot, &dialogue, &lock, &source, msg.chat.id).await
}

async fn finished(
    bot: Bot,
    dialogue: BattleDialogue,
    lock: StateLock,
    source: Arc<Source>,
    msg: Message,
) -> HandlerResult {
    ask_for_topic(&bot, &dialogue, &lock, &source, msg.chat.id).await
}

async fn ask_for_topic(
    bot: &Bot,
    dialogue: &BattleDialogue,
    lock: &StateLock,
    source: &Source,
    chat_id: ChatId,
) -> HandlerResult {
    let keyboard = KeyboardMarkup::new(
        source
            .table()
            .topics()
            .map(|topic| vec![KeyboardButton::new(topic)])
            .collect::<Vec<_>>(),
    );
    bot.send_message(chat_id, "Choose the topic of your battle (or type your own):")
        .reply_markup(keyboard)
        .await?;

    lock.update(dialogue, State::ReceiveTopic).await
}

async fn receive_topic(
    bot: Bot,
    dialogue: BattleDialogue,
    lock: StateLock,
    source: Arc<Source>,
    policy: ExhaustionPolicy,
    msg: Message,
) -> HandlerResult {
    let topic = match msg.text().map(str::trim) {
        Some(topic) if !topic.is_empty() => topic.to_string(),
        _ => {
            bot.send_message(msg.chat.id, "Please send the topic as text")
                .await?;
            return Ok(());
        }
    };
    log::info!("Chat {} chose {topic:?}", msg.chat.id.0);

    bot.send_message(msg.chat.id, format!("Summoning questions on {topic}..."))
        .reply_markup(KeyboardRemove::new())
        .await?;
    // The typing indicator is cosmetic, so a failure here doesn't matter
    let _ = bot
        .send_chat_action(msg.chat.id, ChatAction::Typing)
        .await;

    let mut rng = StdRng::from_entropy();
    let set = source.get_questions(&topic, &mut rng).await;
    log::info!(
        "Chat {}: {} questions on {topic:?} ({:?})",
        msg.chat.id.0,
        set.questions.len(),
        set.origin
    );

    let mut session = BattleSession::new(topic, set.questions, policy, rng)?;
    let commands = session.handle(Event::Start)?;

    lock.update(&dialogue, State::Battle { session }).await?;
    send_rendered(&bot, msg.chat.id, &commands).await
}

async fn battle(
    bot: Bot,
    dialogue: BattleDialogue,
    lock: StateLock,
    mut session: BattleSession,
    msg: Message,
) -> HandlerResult {
    if session.is_locked() {
        log::debug!("Chat {}: answer dropped while the round resolves", msg.chat.id.0);
        return Ok(());
    }

    let index = match (msg.text(), session.current_question()) {
        (Some(text), Some(question)) => question.option_index(text),
        _ => None,
    };
    let Some(index) = index else {
        bot.send_message(msg.chat.id, "Pick one of the answers on the keyboard")
            .await?;
        return Ok(());
    };

    let mut clock = VirtualClock::new();
    let commands = enqueue(&mut clock, session.handle(Event::Answer(index))?);

    // Stored locked, so answers arriving before the timers fire are dropped.
    let locked = State::Battle {
        session: session.clone(),
    };
    if !lock.update_run(&dialogue, session.run_id(), locked).await? {
        return Ok(());
    }
    if let Err(e) = send_rendered(&bot, msg.chat.id, &commands).await {
        log::warn!("Chat {}: failed to send the answer cue: {e}", msg.chat.id.0);
    }

    tokio::spawn(async move {
        let chat_id = dialogue.chat_id().0;
        if let Err(e) = resolve_round(bot, dialogue, lock, session, clock).await {
            log::error!("Chat {chat_id}: failed to resolve the round: {e}");
        }
    });
    Ok(())
}

#[derive(Debug)]
enum Step {
    /// The timer was applied and stored; these commands are left to show.
    Render(Vec<Command>),
    /// The run could not go on and is stored as finished.
    Stopped(BattleError),
    /// The chat has moved on to another run.
    Abandoned,
}

/// Applies one fired timer to the session and stores the result, unless the
/// chat restarted in the meantime.
async fn apply_timer(
    lock: &StateLock,
    dialogue: &BattleDialogue,
    session: &mut BattleSession,
    clock: &mut VirtualClock,
    timer: Timer,
) -> Result<Step, BoxError> {
    let run_id = session.run_id();
    let (next, step) = match session.handle(Event::Timer(timer)) {
        Ok(commands) => {
            let commands = enqueue(clock, commands);
            let next = if session.phase().is_terminal() {
                State::Finished
            } else {
                State::Battle {
                    session: session.clone(),
                }
            };
            (next, Step::Render(commands))
        }
        Err(e) => (State::Finished, Step::Stopped(e)),
    };

    if lock.update_run(dialogue, run_id, next).await? {
        Ok(step)
    } else {
        Ok(Step::Abandoned)
    }
}

/// Plays out the timers of one answer with real sleeps, storing the session
/// after every step.
async fn resolve_round(
    bot: Bot,
    dialogue: BattleDialogue,
    lock: StateLock,
    mut session: BattleSession,
    mut clock: VirtualClock,
) -> HandlerResult {
    let chat_id = dialogue.chat_id();

    while let Some((wait, timer)) = clock.pop_next() {
        tokio::time::sleep(wait).await;

        match apply_timer(&lock, &dialogue, &mut session, &mut clock, timer).await? {
            Step::Render(commands) => {
                // The clock keeps draining after a failed send, so the input
                // lock still gets released.
                if let Err(e) = send_rendered(&bot, chat_id, &commands).await {
                    log::warn!("Chat {}: failed to send a battle update: {e}", chat_id.0);
                }
            }
            Step::Stopped(e) => {
                log::error!("Chat {}: run {:x} stopped: {e}", chat_id.0, session.run_id());
                bot.send_message(chat_id, "The monsters ran out of questions. The battle is over!")
                    .reply_markup(single_button(RETRY))
                    .await?;
                return Ok(());
            }
            Step::Abandoned => {
                log::info!("Chat {}: run {:x} was abandoned", chat_id.0, session.run_id());
                return Ok(());
            }
        }
    }

    if session.phase().is_terminal() {
        log::info!(
            "Chat {}: run on {:?} ended in {:?}",
            chat_id.0,
            session.topic(),
            session.phase()
        );
    }
    Ok(())
}

async fn send_rendered(bot: &Bot, chat_id: ChatId, commands: &[Command]) -> HandlerResult {
    for outgoing in presenter::render(commands) {
        let request = bot.send_message(chat_id, outgoing.text);
        match outgoing.keyboard {
            Keyboard::Unchanged => request.await?,
            Keyboard::Options(options) => {
                request
                    .reply_markup(KeyboardMarkup::new(
                        options
                            .into_iter()
                            .map(|option| vec![KeyboardButton::new(option)]),
                    ))
                    .await?
            }
            Keyboard::Single(label) => request.reply_markup(single_button(label)).await?,
        };
    }

    Ok(())
}

fn single_button(label: &str) -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(label)]])
}
