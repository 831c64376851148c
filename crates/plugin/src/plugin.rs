use std::{sync::Arc, time::Duration};

use {
    gemexp_agents::{
        GeminiApi, GeminiImageGenerator, GeminiTextProvider, ImageGenerator, TextProvider,
    },
    gemexp_channels::ReplySink,
    gemexp_common::types::{InboundMessage, OutboundReply},
    gemexp_config::{GemExpConfig, render},
    gemexp_media::{HttpImageSource, ImageSource, ResultImageStore},
    tracing::{info, warn},
};

use crate::{
    error::{Error, Result},
    extract::ImageExtractor,
    reply::ReplyFormatter,
    session::{CollectionStateMachine, CommandOutcome, FollowUp, ReadyRequest, SessionSettings},
    store::PendingRequestStore,
};

/// System instruction for the optional translation pass.
pub const TRANSLATE_SYSTEM_PROMPT: &str =
    "Translate the following text to English without additional explanation:";

/// Gemini image-editing plugin.
///
/// The host calls [`handle_command`](Self::handle_command) for the command
/// keyword, [`handle_message`](Self::handle_message) for every other message
/// and [`terminate`](Self::terminate) at shutdown.
pub struct GeminiExpPlugin {
    config: GemExpConfig,
    store: Arc<PendingRequestStore>,
    session: CollectionStateMachine,
    generator: Arc<dyn ImageGenerator>,
    translator: Option<Arc<dyn TextProvider>>,
    formatter: ReplyFormatter,
    results: Option<Arc<ResultImageStore>>,
}

impl GeminiExpPlugin {
    pub fn new(
        config: GemExpConfig,
        image_source: Arc<dyn ImageSource>,
        generator: Arc<dyn ImageGenerator>,
    ) -> Self {
        let store = Arc::new(PendingRequestStore::new());
        let extractor = ImageExtractor::new(
            image_source,
            config.max_reply_depth,
            config.max_image_dimension,
        );
        let session = CollectionStateMachine::new(
            Arc::clone(&store),
            extractor,
            SessionSettings::from_config(&config),
        );
        let formatter = ReplyFormatter::new(
            config.bot_id.clone(),
            config.bot_name.clone(),
            config.messages.image_label.clone(),
        );
        Self {
            config,
            store,
            session,
            generator,
            translator: None,
            formatter,
            results: None,
        }
    }

    /// Wire up the Gemini clients, the HTTP image source and a fresh result
    /// directory from `config`.
    pub fn from_config(config: GemExpConfig) -> Result<Self> {
        let timeout = config.request_timeout_secs.map(Duration::from_secs);
        let api = GeminiApi::new(config.api_key.clone(), config.base_url.clone(), timeout)?;
        let results = Arc::new(ResultImageStore::new()?);
        let image_source: Arc<dyn ImageSource> = match timeout {
            Some(timeout) => Arc::new(HttpImageSource::with_timeout(timeout)?),
            None => Arc::new(HttpImageSource::new()),
        };
        let generator = Arc::new(GeminiImageGenerator::new(
            api.clone(),
            config.model.clone(),
            Arc::clone(&results),
        ));
        let translator = config.translate.then(|| {
            Arc::new(GeminiTextProvider::new(api, config.translate_model.clone()))
                as Arc<dyn TextProvider>
        });

        info!(
            model = %config.model,
            translate = config.translate,
            results_dir = %results.dir().display(),
            "gemexp plugin initialised"
        );

        let mut plugin = Self::new(config, image_source, generator).with_result_store(results);
        plugin.translator = translator;
        Ok(plugin)
    }

    /// Translate instructions with `provider` before generation.
    #[must_use]
    pub fn with_translator(mut self, provider: Arc<dyn TextProvider>) -> Self {
        self.translator = Some(provider);
        self
    }

    /// Directory removed by [`terminate`](Self::terminate).
    #[must_use]
    pub fn with_result_store(mut self, results: Arc<ResultImageStore>) -> Self {
        self.results = Some(results);
        self
    }

    pub fn config(&self) -> &GemExpConfig {
        &self.config
    }

    /// The pending-request store shared with the state machine.
    pub fn pending(&self) -> &Arc<PendingRequestStore> {
        &self.store
    }

    /// True if `msg` should be routed to [`handle_command`](Self::handle_command).
    ///
    /// While the sender has an open window, a message that merely starts with
    /// a keyword is input for that window.
    pub fn is_command(&self, msg: &InboundMessage) -> bool {
        if self.store.contains(&msg.sender_id) {
            self.session.is_explicit_invocation(&msg.text)
        } else {
            self.session.is_invocation(&msg.text)
        }
    }

    /// Route a message to the command or follow-up handler.
    pub async fn handle(&self, msg: &InboundMessage, sink: &dyn ReplySink) -> Result<()> {
        if self.is_command(msg) {
            self.handle_command(msg, sink).await
        } else {
            self.handle_message(msg, sink).await
        }
    }

    fn ensure_configured(&self) -> Result<()> {
        if self.config.has_api_key() {
            Ok(())
        } else {
            Err(Error::MissingApiKey)
        }
    }

    /// The initiating command: open a collection window for the sender.
    pub async fn handle_command(&self, msg: &InboundMessage, sink: &dyn ReplySink) -> Result<()> {
        if let Err(e) = self.ensure_configured() {
            warn!(user_id = %msg.sender_id, error = %e, "command refused");
            sink.send_text(&self.config.messages.missing_api_key).await?;
            return Ok(());
        }

        let text = match self.session.start(&msg.sender_id) {
            CommandOutcome::Started | CommandOutcome::Restarted => {
                let timeout = self.config.timeout_secs.to_string();
                render(&self.config.messages.prompt, &[
                    ("name", msg.display_name()),
                    ("timeout", timeout.as_str()),
                ])
            },
            CommandOutcome::AlreadyWaiting => self.config.messages.already_waiting.clone(),
        };
        sink.send_text(&text).await?;
        Ok(())
    }

    /// Any non-command message.
    pub async fn handle_message(&self, msg: &InboundMessage, sink: &dyn ReplySink) -> Result<()> {
        let messages = &self.config.messages;
        match self.session.follow_up(msg).await {
            FollowUp::Ignored | FollowUp::Skipped => {},
            FollowUp::Expired => sink.send_text(&messages.timeout).await?,
            FollowUp::ImageFailed(e) => {
                let error = Error::Media(e).to_string();
                sink.send_text(&render(&messages.image_failed, &[("error", error.as_str())]))
                    .await?;
            },
            FollowUp::NeedText => sink.send_text(&messages.need_text).await?,
            FollowUp::NeedImage => sink.send_text(&messages.need_image).await?,
            FollowUp::Ready(request) => {
                let user_id = request.user_id.clone();
                match self.run_pipeline(request, sink).await {
                    Ok(reply) => sink.send(reply).await?,
                    Err(Error::Channel(e)) => return Err(Error::Channel(e)),
                    Err(Error::Translation(e)) => {
                        warn!(%user_id, error = %e, "translation failed");
                        sink.send_text(&messages.translate_failed).await?;
                    },
                    Err(e) => {
                        warn!(%user_id, error = %e, "generation failed");
                        let error = e.to_string();
                        sink.send_text(&render(&messages.failed, &[("error", error.as_str())]))
                            .await?;
                    },
                }
            },
        }
        Ok(())
    }

    async fn run_pipeline(
        &self,
        request: ReadyRequest,
        sink: &dyn ReplySink,
    ) -> Result<OutboundReply> {
        let text = match &self.translator {
            Some(provider) => provider
                .text_chat(&request.text, Some(TRANSLATE_SYSTEM_PROMPT))
                .await
                .map_err(Error::translation)?,
            None => request.text,
        };

        sink.send_text(&render(&self.config.messages.processing, &[("text", text.as_str())]))
            .await?;

        info!(
            user_id = %request.user_id,
            model = %self.generator.model(),
            text_len = text.len(),
            images = request.images.len(),
            "starting generation"
        );
        let result = self.generator.generate(&text, &request.images).await?;
        Ok(self.formatter.format(result))
    }

    /// Drop all pending records and remove generated files.
    pub fn terminate(&self) {
        let pending = self.store.len();
        self.store.clear();
        if let Some(results) = &self.results {
            results.cleanup();
        }
        info!(pending, "gemexp plugin terminated");
    }
}
