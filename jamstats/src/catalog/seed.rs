//! Built-in songs and venues with the names fans actually use for them.

/// (name, aliases)
pub(super) const SONGS: &[(&str, &[&str])] = &[
    ("Tweezer", &[]),
    ("Tweezer Reprise", &["tweeprise", "tweezer reprise"]),
    ("You Enjoy Myself", &["yem"]),
    ("Down with Disease", &["dwd", "disease"]),
    ("Chalk Dust Torture", &["cdt", "chalkdust"]),
    ("Mike's Song", &["mikes", "mike's"]),
    ("Weekapaug Groove", &["weekapaug", "paug"]),
    ("Harry Hood", &["hood"]),
    ("Bathtub Gin", &["gin"]),
    ("Run Like an Antelope", &["antelope"]),
    ("David Bowie", &["bowie"]),
    ("Split Open and Melt", &["soam", "melt"]),
    ("Slave to the Traffic Light", &["slave"]),
    ("Fluffhead", &["fluff"]),
    ("Also Sprach Zarathustra", &["2001", "also sprach"]),
    ("Ghost", &[]),
    ("Reba", &[]),
    ("Simple", &[]),
    ("Piper", &[]),
    ("Carini", &[]),
    ("Light", &[]),
    ("Sand", &[]),
    ("Stash", &[]),
    ("Divided Sky", &["the divided sky"]),
    ("Wilson", &[]),
    ("Possum", &[]),
    ("Character Zero", &["zero"]),
    ("Sample in a Jar", &["sample"]),
    ("Free", &[]),
    ("Golgi Apparatus", &["golgi"]),
    ("Punch You in the Eye", &["pyite"]),
    ("Runaway Jim", &["jim"]),
    ("The Moma Dance", &["moma"]),
    ("46 Days", &[]),
    ("Fuego", &[]),
    ("Backwards Down the Number Line", &["bdtnl"]),
    ("Sigma Oasis", &[]),
    ("Everything's Right", &["everythings right"]),
    ("Set Your Soul Free", &["sysf"]),
];

/// (name, city, country, aliases)
pub(super) const VENUES: &[(&str, &str, &str, &[&str])] = &[
    (
        "Madison Square Garden",
        "New York, NY",
        "USA",
        &["msg", "garden", "the garden", "madison square"],
    ),
    (
        "Alpine Valley Music Theatre",
        "East Troy, WI",
        "USA",
        &["alpine", "alpine valley"],
    ),
    (
        "Dick's Sporting Goods Park",
        "Commerce City, CO",
        "USA",
        &["dicks", "dick's", "commerce city"],
    ),
    ("Shoreline Amphitheatre", "Mountain View, CA", "USA", &["shoreline"]),
    (
        "Lake Tahoe Outdoor Arena at Harveys",
        "Stateline, NV",
        "USA",
        &["tahoe", "harveys"],
    ),
    ("Fenway Park", "Boston, MA", "USA", &["fenway"]),
    ("Sphere", "Las Vegas, NV", "USA", &["las vegas sphere", "the sphere"]),
    (
        "Moon Palace Resort",
        "Quintana Roo",
        "Mexico",
        &["riviera", "cancun", "riviera maya"],
    ),
    ("MGM Grand Garden Arena", "Las Vegas, NV", "USA", &["mgm"]),
    ("Hampton Coliseum", "Hampton, VA", "USA", &["hampton", "mothership"]),
    (
        "Great Woods Center for the Performing Arts",
        "Mansfield, MA",
        "USA",
        &["great woods", "mansfield"],
    ),
    (
        "Saratoga Performing Arts Center",
        "Saratoga Springs, NY",
        "USA",
        &["spac", "saratoga"],
    ),
    (
        "Bethel Woods Center for the Arts",
        "Bethel, NY",
        "USA",
        &["bethel", "bethel woods"],
    ),
    (
        "Darien Lake Performing Arts Center",
        "Darien Center, NY",
        "USA",
        &["darien", "darien lake"],
    ),
    ("Jones Beach Theater", "Wantagh, NY", "USA", &["jones beach"]),
    (
        "Deer Creek Music Center",
        "Noblesville, IN",
        "USA",
        &["deer creek", "noblesville", "ruoff"],
    ),
    (
        "Merriweather Post Pavilion",
        "Columbia, MD",
        "USA",
        &["merriweather", "merriweather post"],
    ),
    (
        "The Gorge Amphitheatre",
        "George, WA",
        "USA",
        &["gorge", "the gorge"],
    ),
    (
        "Red Rocks Amphitheatre",
        "Morrison, CO",
        "USA",
        &["red rocks"],
    ),
    ("Hollywood Bowl", "Hollywood, CA", "USA", &["the bowl"]),
    ("Big Cypress", "Big Cypress Seminole Reservation, FL", "USA", &["cypress"]),
];
