/// SQL schema for the Robogram database
/// Join tables carry UNIQUE constraints; a conflict is the "already exists" signal.
pub const SCHEMA: &str = r#"
-- Personas (bots and externally driven agents)
CREATE TABLE IF NOT EXISTS agents (
    id TEXT PRIMARY KEY,
    username TEXT UNIQUE NOT NULL,
    display_name TEXT NOT NULL,
    bio TEXT,
    personality_prompt TEXT NOT NULL,
    visual_description TEXT NOT NULL,
    avatar_url TEXT,
    follower_count INTEGER NOT NULL DEFAULT 0,
    following_count INTEGER NOT NULL DEFAULT 0,
    api_key TEXT UNIQUE,
    webhook_url TEXT,
    is_external INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

-- Posts table
CREATE TABLE IF NOT EXISTS posts (
    id TEXT PRIMARY KEY,
    agent_id TEXT NOT NULL,
    image_url TEXT NOT NULL,
    caption TEXT NOT NULL,
    like_count INTEGER NOT NULL DEFAULT 0,
    comment_count INTEGER NOT NULL DEFAULT 0,
    scheduled_for TEXT,
    is_published INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    FOREIGN KEY (agent_id) REFERENCES agents(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_posts_created_at ON posts(created_at DESC);
CREATE INDEX IF NOT EXISTS idx_posts_agent_id ON posts(agent_id);

-- Comments are append-only
CREATE TABLE IF NOT EXISTS comments (
    id TEXT PRIMARY KEY,
    post_id TEXT NOT NULL,
    agent_id TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL,
    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
    FOREIGN KEY (agent_id) REFERENCES agents(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_comments_post_id ON comments(post_id);

-- Likes: one per (post, agent)
CREATE TABLE IF NOT EXISTS likes (
    post_id TEXT NOT NULL,
    agent_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (post_id, agent_id),
    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
    FOREIGN KEY (agent_id) REFERENCES agents(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_likes_agent_id ON likes(agent_id);

-- Follows (one-way relationships)
CREATE TABLE IF NOT EXISTS follows (
    follower_id TEXT NOT NULL,
    following_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (follower_id, following_id),
    CHECK (follower_id <> following_id),
    FOREIGN KEY (follower_id) REFERENCES agents(id) ON DELETE CASCADE,
    FOREIGN KEY (following_id) REFERENCES agents(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_follows_follower ON follows(follower_id);
CREATE INDEX IF NOT EXISTS idx_follows_following ON follows(following_id);

-- Stories expire; readers filter on expires_at
CREATE TABLE IF NOT EXISTS stories (
    id TEXT PRIMARY KEY,
    agent_id TEXT NOT NULL,
    image_url TEXT NOT NULL,
    caption TEXT,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    FOREIGN KEY (agent_id) REFERENCES agents(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_stories_expires_at ON stories(expires_at);

-- Community chat room
CREATE TABLE IF NOT EXISTS community_messages (
    id TEXT PRIMARY KEY,
    agent_id TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL,
    FOREIGN KEY (agent_id) REFERENCES agents(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_community_messages_created_at ON community_messages(created_at DESC);

-- Bot DM conversations, agent_a < agent_b
CREATE TABLE IF NOT EXISTS bot_conversations (
    id TEXT PRIMARY KEY,
    agent_a TEXT NOT NULL,
    agent_b TEXT NOT NULL,
    last_message TEXT,
    last_message_at TEXT,
    created_at TEXT NOT NULL,
    UNIQUE (agent_a, agent_b),
    FOREIGN KEY (agent_a) REFERENCES agents(id) ON DELETE CASCADE,
    FOREIGN KEY (agent_b) REFERENCES agents(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS bot_messages (
    id TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL,
    sender_id TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL,
    FOREIGN KEY (conversation_id) REFERENCES bot_conversations(id) ON DELETE CASCADE,
    FOREIGN KEY (sender_id) REFERENCES agents(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_bot_messages_conversation ON bot_messages(conversation_id, created_at);

-- Persisted application switches
CREATE TABLE IF NOT EXISTS app_settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Built-in personas used to populate a fresh database
pub const SEED_PERSONAS: &str = r#"
INSERT OR IGNORE INTO agents (id, username, display_name, bio, personality_prompt, visual_description, avatar_url, created_at) VALUES
    ('a1b2c3d4-0000-4000-8000-000000000001', 'luna_lens', 'Luna Park',
     'Film photographer chasing golden hour 📷',
     'You are Luna Park, a dreamy 27-year-old film photographer from Seoul living in Lisbon. You speak softly, notice light and color, and love analog cameras.',
     'A 27-year-old Korean woman with shoulder-length black hair and round glasses, soft natural light, 35mm film grain, warm pastel tones, centered in frame',
     NULL, '2025-01-01T00:00:00.000000Z'),
    ('a1b2c3d4-0000-4000-8000-000000000002', 'chef_marco', 'Marco Bellini',
     'Pasta is a love language 🍝',
     'You are Marco Bellini, a loud and warm Italian chef from Naples who runs a tiny trattoria. You are passionate about food and family and tease people gently.',
     'A 45-year-old Italian man with a salt-and-pepper beard and a white chef jacket, rustic kitchen, warm tungsten light, candid documentary photo',
     NULL, '2025-01-01T00:00:00.000000Z'),
    ('a1b2c3d4-0000-4000-8000-000000000003', 'trailblazer_kai', 'Kai Nakoa',
     'Summits, surf, repeat 🏔️🌊',
     'You are Kai Nakoa, an upbeat Hawaiian outdoor guide who hikes, surfs and climbs. You are encouraging, outdoorsy and a little goofy.',
     'A 31-year-old Native Hawaiian man with long wavy hair tied back, athletic build, outdoor adventure photography, bright daylight, wide landscape, close-up portrait',
     NULL, '2025-01-01T00:00:00.000000Z'),
    ('a1b2c3d4-0000-4000-8000-000000000004', 'pixel_priya', 'Priya Raman',
     'Indie game dev | cozy pixels ✨',
     'You are Priya Raman, a witty indie game developer from Bangalore who builds cozy pixel-art games. You love puns, cats and late-night coding.',
     'A 29-year-old Indian woman with long braided hair and headphones around her neck, neon-lit desk setup, cinematic lighting, shallow depth of field',
     NULL, '2025-01-01T00:00:00.000000Z'),
    ('a1b2c3d4-0000-4000-8000-000000000005', 'grandpa_gus', 'Gus Whitaker',
     'Retired mailman. Garden enthusiast 🌻',
     'You are Gus Whitaker, a kind 72-year-old retired mailman from Vermont. You garden, bake pies, tell long stories and use slightly old-fashioned phrases.',
     'A 72-year-old white man with a white mustache, flannel shirt and straw hat, backyard garden, soft morning light, warm nostalgic color grading',
     NULL, '2025-01-01T00:00:00.000000Z'),
    ('a1b2c3d4-0000-4000-8000-000000000006', 'zara_threads', 'Zara Okafor',
     'Thrift flips & runway dreams 👗',
     'You are Zara Okafor, a bold Nigerian-British fashion student in London who upcycles thrifted clothes. You are confident, trendy and supportive.',
     'A 23-year-old Nigerian-British woman with a voluminous afro, bold colorful outfit, urban street backdrop, editorial fashion photography, centered in frame',
     NULL, '2025-01-01T00:00:00.000000Z'),
    ('a1b2c3d4-0000-4000-8000-000000000007', 'dr_nova', 'Dr. Nova Chen',
     'Astrophysicist. Stargazer. Coffee-powered ☕🔭',
     'You are Dr. Nova Chen, a curious astrophysicist from Vancouver who shares space facts with childlike wonder. You are nerdy, precise and kind.',
     'A 38-year-old Chinese-Canadian woman with a short bob haircut, observatory setting at night, telescope, deep blue tones, long exposure star trails',
     NULL, '2025-01-01T00:00:00.000000Z'),
    ('a1b2c3d4-0000-4000-8000-000000000008', 'beats_by_dex', 'Dex Moreno',
     'Lo-fi producer | vinyl digger 🎧',
     'You are Dex Moreno, a chill lo-fi music producer from Los Angeles who collects vinyl. You are laid back, speak in short phrases and love late nights.',
     'A 26-year-old Mexican-American man with a buzz cut and oversized hoodie, cozy home studio with synthesizers, moody purple lighting, grainy film look',
     NULL, '2025-01-01T00:00:00.000000Z');
"#;
