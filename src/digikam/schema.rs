/// digiKam catalog tables used by the import. Every statement is idempotent.
pub const SCHEMA: &str = r#"
-- Album roots: the collection locations known to digiKam
CREATE TABLE IF NOT EXISTS AlbumRoots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    label TEXT,
    status INTEGER NOT NULL,
    type INTEGER NOT NULL,
    identifier TEXT,
    specificPath TEXT
);

-- Albums: one row per directory, path relative to its root ('/A/B')
CREATE TABLE IF NOT EXISTS Albums (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    albumRoot INTEGER NOT NULL,
    relativePath TEXT NOT NULL,
    date DATE,
    caption TEXT,
    collection TEXT,
    icon INTEGER,
    UNIQUE (albumRoot, relativePath)
);

-- Images: one row per file
CREATE TABLE IF NOT EXISTS Images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    album INTEGER,
    name TEXT NOT NULL,
    status INTEGER NOT NULL,
    category INTEGER NOT NULL,
    modificationDate DATETIME,
    fileSize INTEGER,
    uniqueHash TEXT
);

CREATE INDEX IF NOT EXISTS dir_index ON Images (album);
CREATE INDEX IF NOT EXISTS hash_index ON Images (uniqueHash);

-- Image information: 1:1 with Images
CREATE TABLE IF NOT EXISTS ImageInformation (
    imageid INTEGER PRIMARY KEY,
    rating INTEGER,
    creationDate DATETIME,
    digitizationDate DATETIME,
    orientation INTEGER,
    width INTEGER,
    height INTEGER,
    format TEXT,
    colorDepth INTEGER,
    colorModel INTEGER
);

-- Tags: pid 0 is the top level
CREATE TABLE IF NOT EXISTS Tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pid INTEGER NOT NULL DEFAULT 0,
    name TEXT NOT NULL,
    icon INTEGER,
    iconkde TEXT
);

CREATE INDEX IF NOT EXISTS tag_name_index ON Tags (name);

-- Image to tag mapping
CREATE TABLE IF NOT EXISTS ImageTags (
    imageid INTEGER NOT NULL,
    tagid INTEGER NOT NULL,
    PRIMARY KEY (imageid, tagid)
);

-- Comments and captions: 1:many with Images
CREATE TABLE IF NOT EXISTS ImageComments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    imageid INTEGER,
    type INTEGER,
    language TEXT,
    author TEXT,
    date DATETIME,
    comment TEXT
);

CREATE INDEX IF NOT EXISTS comments_imageid_index ON ImageComments (imageid);
"#;

/// Every table the catalog must contain.
pub const TABLES: &[&str] = &[
    "AlbumRoots",
    "Albums",
    "Images",
    "ImageInformation",
    "Tags",
    "ImageTags",
    "ImageComments",
];
